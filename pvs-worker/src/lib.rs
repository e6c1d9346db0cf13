//! The per-camera ingest/inference/annotate/publish pipeline and the
//! supervisor that reconciles it against the authoritative camera list
//! (spec.md §4.1, §4.5). The binary entry point lives in `main.rs`; this
//! crate root exposes the pieces so integration tests (and the frontend's
//! shared-process smoke tests) can assemble a supervisor without going
//! through `clap`.

mod backoff;
mod camera_worker;
mod decoder;
mod detector;
mod error;
mod runtime;
mod supervisor;

pub use backoff::reconnect_delay;
pub use camera_worker::{CameraWorker, WorkerDeps};
pub use decoder::NullDecoder;
pub use detector::NullDetector;
pub use error::WorkerError;
pub use runtime::{shared, SharedRuntime};
pub use supervisor::CameraSupervisor;
