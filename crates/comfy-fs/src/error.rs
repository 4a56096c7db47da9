//! Error types for comfy-fs

use std::path::PathBuf;
use std::time::Duration;

/// Result type for comfy-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in comfy-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON at {path}: {message}")]
    JsonParse { path: PathBuf, message: String },

    #[error("Failed to serialize JSON for {path}: {message}")]
    JsonSerialize { path: PathBuf, message: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Timed out after {timeout:?} waiting for lock {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("Could not determine a cache directory for this platform")]
    NoCacheDir,

    #[error("Path escapes its root: {path}")]
    PathEscape { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
