//! Error types for comfy-recreate

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fs(#[from] comfy_fs::Error),

    #[error(transparent)]
    Manifest(#[from] comfy_manifest::Error),

    #[error(transparent)]
    Tool(#[from] comfy_tools::Error),

    #[error(transparent)]
    Cache(#[from] comfy_cache::Error),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} returned HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("Download of {url} exceeds {limit} bytes")]
    DownloadTooLarge { url: String, limit: u64 },

    #[error("Unsupported archive format from {url}")]
    UnsupportedArchive { url: String },

    #[error("Failed to extract archive: {message}")]
    Extract { message: String },

    #[error("Archive entry escapes the extraction directory: {path}")]
    PathTraversal { path: String },

    #[error("Target directory is not empty: {path}")]
    TargetNotEmpty { path: PathBuf },

    #[error("Failed to create virtual environment at {path}: {source}")]
    VenvCreation {
        path: PathBuf,
        #[source]
        source: comfy_tools::Error,
    },

    #[error("Local custom node '{name}' is not present at {path}")]
    LocalNodeMissing { name: String, path: PathBuf },
}
