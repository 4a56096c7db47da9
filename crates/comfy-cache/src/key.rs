//! Cache key derivation

use comfy_fs::compute_content_checksum;
use comfy_manifest::InstallMethod;

/// Hex characters kept from the digest.
pub const CACHE_KEY_LEN: usize = 16;

/// Deterministic key for a `(url, method, ref)` triple.
///
/// A missing ref hashes the same as an empty one.
pub fn generate_cache_key(url: &str, method: InstallMethod, git_ref: Option<&str>) -> String {
    let material = format!("{url}|{}|{}", method.as_str(), git_ref.unwrap_or(""));
    let digest = compute_content_checksum(&material);
    let hex = digest.strip_prefix("sha256:").unwrap_or(&digest);
    hex[..CACHE_KEY_LEN].to_string()
}
