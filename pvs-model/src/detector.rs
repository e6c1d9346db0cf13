use crate::error::InferenceError;
use image::RgbImage;
use pvs_types::Detection;

/// A loaded object-detection model (spec.md §4.2: "treated as a black-box
/// predictor"). `predict` takes `&mut self` because real backends (an ONNX
/// Runtime session, a Torch module handle) typically carry mutable
/// execution state even when logically read-only; [`SharedModel`] owns the
/// single instance on a dedicated worker task so callers never need the
/// detector itself to be `Sync`.
///
/// [`SharedModel`]: crate::SharedModel
pub trait Detector: Send + 'static {
    /// Runs inference on `frame`, filtering to detections at or above
    /// `confidence`. `size` is the square image side used internally
    /// (spec.md §4.2), already clamped by the caller per §9 Open Question
    /// (a).
    fn predict(
        &mut self,
        frame: &RgbImage,
        confidence: f32,
        size: u32,
    ) -> Result<Vec<Detection>, InferenceError>;
}
