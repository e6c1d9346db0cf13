//! The shared detector and its off-loop dispatcher (spec.md §4.2): one
//! model instance serving every camera, decoupled from the per-camera
//! streaming loop so model latency never gates stream FPS.

mod detector;
mod dispatcher;
mod error;
mod shared_model;

pub use detector::Detector;
pub use dispatcher::{InferenceDispatcher, InferenceOutcome};
pub use error::InferenceError;
pub use shared_model::SharedModel;
