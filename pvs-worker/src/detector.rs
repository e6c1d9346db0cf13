use image::RgbImage;
use pvs_model::{Detector, InferenceError};
use pvs_types::Detection;

/// The object-detection model itself is out of scope (spec.md §1: "treated
/// as a black-box predictor meeting the contract in §4.2"); this always
/// returns no detections so the binary is runnable end to end. A real
/// deployment swaps in an ONNX/TensorRT-backed `Detector`.
pub struct NullDetector;

impl Detector for NullDetector {
    fn predict(
        &mut self,
        _frame: &RgbImage,
        _confidence: f32,
        _size: u32,
    ) -> Result<Vec<Detection>, InferenceError> {
        Ok(Vec::new())
    }
}
