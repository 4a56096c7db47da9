//! Detection settings

use std::path::PathBuf;

use comfy_remote::RemoteConfig;

use crate::priority::ScoringConfig;

/// Binary queried for the accelerator driver version.
pub const DEFAULT_NVIDIA_SMI: &str = "nvidia-smi";

/// Interpreter used when none is given and no virtual environment is found.
pub const DEFAULT_PYTHON: &str = "python3";

/// Settings for one detection run.
#[derive(Debug, Clone)]
pub struct DetectConfig {
    /// Interpreter of the environment to capture. Discovered next to the
    /// application when unset.
    pub python: Option<PathBuf>,
    /// Consult the registry and GitHub for each extension.
    pub validate_registry: bool,
    /// Leave `custom_nodes/` out of the capture entirely.
    pub skip_custom_nodes: bool,
    pub remote: RemoteConfig,
    pub scoring: ScoringConfig,
    pub nvidia_smi: PathBuf,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            python: None,
            validate_registry: false,
            skip_custom_nodes: false,
            remote: RemoteConfig::default(),
            scoring: ScoringConfig::default(),
            nvidia_smi: PathBuf::from(DEFAULT_NVIDIA_SMI),
        }
    }
}
