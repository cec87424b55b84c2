use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("source path not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("destination already exists, refusing to overwrite: {0}")]
    DestinationCollision(PathBuf),

    #[error("directory still present after removal: {0}")]
    DeletionIncomplete(PathBuf),

    #[error("slice fraction must be in (0, 1], got {0}")]
    InvalidFraction(f64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
