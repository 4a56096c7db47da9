//! Error types for comfy-cache

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fs(#[from] comfy_fs::Error),

    #[error("Cache source is not a directory: {path}")]
    InvalidSource { path: PathBuf },

    #[error("No cache entry for key {key}")]
    NotFound { key: String },
}
