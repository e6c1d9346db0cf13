use thiserror::Error;

/// The *transient-source*/*unrecoverable-source* error kinds from spec.md §7,
/// narrowed to what a `FrameSource` itself can fail at (connect, decode).
#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("source exhausted (end of file)")]
    Exhausted,

    /// spec.md §7 "credential" kind: "treated as unrecoverable-source with
    /// a descriptive message" — distinguishable from an ordinary candidate
    /// fallback so the caller can move the camera straight to `error`
    /// instead of cascading to the next source tier.
    #[error("credential error: {0}")]
    Credential(String),
}
