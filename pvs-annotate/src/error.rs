use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("jpeg encode failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write thumbnail {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
