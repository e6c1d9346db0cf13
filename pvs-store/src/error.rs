use thiserror::Error;

/// The *store* error kind from spec.md §7: failures persisting or reading
/// back camera/event state from Postgres.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("camera {0} not found")]
    CameraNotFound(String),

    #[error("malformed column {column}: {value:?}")]
    MalformedColumn { column: &'static str, value: String },
}
