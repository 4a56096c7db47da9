//! Recreation settings

use std::path::PathBuf;
use std::time::Duration;

/// Fraction of a dependency class that must install for the class to count
/// as successful.
pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 0.8;

pub const DEFAULT_COMFYUI_REPO: &str = "https://github.com/comfyanonymous/ComfyUI.git";

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on a downloaded archive.
pub const MAX_DOWNLOAD_SIZE: u64 = 500 * 1024 * 1024;

/// Runtime directory under the target.
pub const VENV_DIR: &str = ".venv";
/// Application directory under the target.
pub const APP_DIR: &str = "ComfyUI";
pub const CUSTOM_NODES_DIR: &str = "custom_nodes";

#[derive(Debug, Clone)]
pub struct RecreateConfig {
    pub uv: PathBuf,
    pub git: PathBuf,
    /// Consult and populate the node cache.
    pub enable_cache: bool,
    /// Cache root; `None` disables the cache as well.
    pub cache_root: Option<PathBuf>,
    /// Passed to uv as `UV_CACHE_DIR`.
    pub uv_cache_dir: Option<PathBuf>,
    /// Passed to uv as `UV_PYTHON_INSTALL_DIR`.
    pub python_install_dir: Option<PathBuf>,
    pub comfyui_repo_url: String,
    pub success_threshold: f64,
    pub download_timeout: Duration,
    pub max_download_size: u64,
}

impl Default for RecreateConfig {
    fn default() -> Self {
        Self {
            uv: PathBuf::from("uv"),
            git: PathBuf::from("git"),
            enable_cache: true,
            cache_root: None,
            uv_cache_dir: None,
            python_install_dir: None,
            comfyui_repo_url: DEFAULT_COMFYUI_REPO.to_string(),
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            max_download_size: MAX_DOWNLOAD_SIZE,
        }
    }
}
