use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("thumbnail generation failed: {0}")]
    Thumbnail(#[from] pvs_annotate::AnnotateError),

    #[error("store error: {0}")]
    Store(#[from] pvs_store::StoreError),

    #[error("bus error: {0}")]
    Bus(#[from] pvs_bus::BusError),

    #[error("event payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
