//! Directory tree helpers: recursive copy, size, move, emptiness

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::{Error, Result};

/// Recursively copy `src` into `dst`, creating `dst` if needed.
///
/// Symlinks are recreated as symlinks on unix and copied as files elsewhere.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<u64> {
    fs::create_dir_all(dst).map_err(|e| Error::io(dst, e))?;
    let mut copied = 0u64;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            Error::io(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::PathEscape {
                path: entry.path().to_path_buf(),
            })?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            copied += fs::copy(entry.path(), &target).map_err(|e| Error::io(&target, e))?;
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| Error::io(src, e))?;
    std::os::unix::fs::symlink(&link, dst).map_err(|e| Error::io(dst, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir_all(src, dst).map(|_| ())
    } else {
        fs::copy(src, dst).map(|_| ()).map_err(|e| Error::io(dst, e))
    }
}

/// Total size in bytes of all regular files under `root`.
pub fn dir_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            let meta = entry
                .metadata()
                .map_err(|e| Error::io(entry.path(), e.into()))?;
            total += meta.len();
        }
    }
    Ok(total)
}

/// Remove `path` if it exists, whether file or directory.
pub fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.is_dir() {
        fs::remove_dir_all(path).map_err(|e| Error::io(path, e))
    } else {
        fs::remove_file(path).map_err(|e| Error::io(path, e))
    }
}

/// Move `src` to `dst`, replacing any existing `dst`.
///
/// Falls back to copy-then-delete when a rename crosses filesystems.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    remove_path(dst)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    tracing::debug!(src = %src.display(), dst = %dst.display(), "rename failed, copying");
    copy_dir_all(src, dst)?;
    remove_path(src)
}

/// True when `path` does not exist or is an empty directory.
pub fn is_missing_or_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let mut entries = fs::read_dir(path).map_err(|e| Error::io(path, e))?;
    Ok(entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_dir_all_copies_nested_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/c.txt"), "hello").unwrap();
        fs::write(src.path().join("top.txt"), "hi").unwrap();

        let target = dst.path().join("copy");
        let bytes = copy_dir_all(src.path(), &target).unwrap();

        assert_eq!(bytes, 7);
        assert_eq!(fs::read_to_string(target.join("a/b/c.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(target.join("top.txt")).unwrap(), "hi");
    }

    #[test]
    fn dir_size_sums_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::write(dir.path().join("x/a"), "1234").unwrap();
        fs::write(dir.path().join("b"), "56").unwrap();
        assert_eq!(dir_size(dir.path()).unwrap(), 6);
    }

    #[test]
    fn move_dir_replaces_existing_destination() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        let dst = root.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("new.txt"), "new").unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("old.txt"), "old").unwrap();

        move_dir(&src, &dst).unwrap();

        assert!(!src.exists());
        assert!(dst.join("new.txt").exists());
        assert!(!dst.join("old.txt").exists());
    }

    #[test]
    fn missing_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_missing_or_empty(&dir.path().join("nope")).unwrap());
        assert!(is_missing_or_empty(dir.path()).unwrap());
        fs::write(dir.path().join("f"), "").unwrap();
        assert!(!is_missing_or_empty(dir.path()).unwrap());
    }
}
