//! Error types for comfy-detect

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
    Remote(#[from] comfy_remote::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Application directory not found: {path}")]
    AppNotFound { path: PathBuf },
}
