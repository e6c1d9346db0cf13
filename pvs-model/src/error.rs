use thiserror::Error;

/// The *inference* error kind from spec.md §7: the predictor raised, or the
/// single-worker queue backing it has gone away.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("predictor error: {0}")]
    Predictor(String),

    #[error("shared model worker is not running")]
    WorkerGone,
}
