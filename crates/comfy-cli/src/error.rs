//! Error types for comfy-cli

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Detect(#[from] comfy_detect::Error),

    #[error(transparent)]
    Recreate(#[from] comfy_recreate::Error),

    #[error(transparent)]
    Cache(#[from] comfy_cache::Error),

    #[error(transparent)]
    Manifest(#[from] comfy_manifest::Error),

    #[error(transparent)]
    Fs(#[from] comfy_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file {path}: {source}")]
    Settings {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
