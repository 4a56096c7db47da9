//! Error types for comfy-manifest

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or validating manifests.
///
/// Every variant is a configuration/validation error: callers surface it
/// immediately and never retry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Filesystem error: {0}")]
    Fs(#[from] comfy_fs::Error),

    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported schema version '{found}' (expected '{expected}')")]
    UnsupportedSchema { found: String, expected: String },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Custom node '{name}': {reason}")]
    InvalidCustomNode { name: String, reason: String },

    #[error("Invalid install method '{0}' (expected archive, git or local)")]
    InvalidInstallMethod(String),

    #[error("Invalid version constraint '{constraint}': {reason}")]
    VersionConstraintParse { constraint: String, reason: String },

    #[error("Invalid requirement '{line}': {reason}")]
    RequirementParse { line: String, reason: String },
}

impl Error {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn node(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCustomNode {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
