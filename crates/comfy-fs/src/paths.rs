//! Cache root resolution

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Environment variable that overrides the cache root.
///
/// Only the CLI entry point reads it; library code receives the resolved
/// path explicitly.
pub const CACHE_ROOT_ENV: &str = "COMFY_ENV_CACHE_DIR";

/// Fixed subpath appended to the platform cache directory.
pub const CACHE_SUBPATH: &str = "comfy-env/custom_nodes";

/// Platform default cache root.
///
/// - Windows: `{FOLDERID_LocalAppData}\comfy-env\custom_nodes`
/// - macOS: `~/Library/Caches/comfy-env/custom_nodes`
/// - other: `$XDG_CACHE_HOME/comfy-env/custom_nodes` (or `~/.cache/...`)
pub fn default_cache_root() -> Result<PathBuf> {
    let base = dirs::cache_dir().ok_or(Error::NoCacheDir)?;
    Ok(join_subpath(&base))
}

/// Resolve the cache root, preferring an explicit override.
pub fn resolve_cache_root(override_root: Option<&Path>) -> Result<PathBuf> {
    match override_root {
        Some(root) => Ok(root.to_path_buf()),
        None => default_cache_root(),
    }
}

fn join_subpath(base: &Path) -> PathBuf {
    CACHE_SUBPATH
        .split('/')
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}
