use thiserror::Error;

/// The *bus* error kind from spec.md §7: publish/subscribe failures against
/// the Redis-backed transport.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("bus subscription closed")]
    Closed,

    #[error("malformed camera_meta hash field {0:?}")]
    MalformedMeta(String),
}
