use thiserror::Error;

/// The error kinds of spec.md §7, narrowed to what the worker itself needs
/// a concrete type for (propagation policy differs per kind; see
/// `CameraWorker::run`).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("transient source error: {0}")]
    TransientSource(String),

    #[error("source retry budget exhausted: {0}")]
    UnrecoverableSource(String),

    #[error("credential error: {0}")]
    Credential(String),
}
