use parking_lot::Mutex;
use pvs_types::CameraRuntime;
use std::sync::Arc;

/// `CameraRuntime` fields are mutated from both the per-camera streaming
/// loop and the inference-completion callback (spec.md §5); wrapping the
/// whole struct in one mutex gives the "atomically swapped, no torn read"
/// guarantee §5 asks of `last_detections` without a separate lock per
/// field.
pub type SharedRuntime = Arc<Mutex<CameraRuntime>>;

pub fn shared(runtime: CameraRuntime) -> SharedRuntime {
    Arc::new(Mutex::new(runtime))
}
