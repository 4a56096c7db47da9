//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! cache integrity verification. Tree checksums cover every regular file and
//! symlink under a root, visited in sorted relative-path order so the result
//! does not depend on directory iteration order.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of string content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}

/// Compute a whole-tree checksum over sorted relative paths and file bytes.
///
/// Each entry contributes its relative path (forward slashes), a NUL
/// separator, and either the file bytes or `->` plus the symlink target.
/// Directories only contribute through the files they contain.
pub fn compute_tree_checksum(root: &Path) -> Result<String> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, e.into())
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| Error::PathEscape {
                path: entry.path().to_path_buf(),
            })?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((key, entry.path().to_path_buf(), file_type.is_symlink()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (key, path, is_symlink) in entries {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        if is_symlink {
            let target = fs::read_link(&path).map_err(|e| Error::io(&path, e))?;
            hasher.update(b"->");
            hasher.update(target.to_string_lossy().as_bytes());
        } else {
            let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
            hasher.update(&bytes);
        }
        hasher.update([0u8]);
    }
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}
