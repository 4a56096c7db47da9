//! The node cache proper

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use comfy_fs::tree::{copy_dir_all, dir_size, move_dir, remove_path};
use comfy_fs::{DirLock, LockMode, compute_tree_checksum, io};
use comfy_manifest::CustomNodeSpec;

use crate::entry::{CacheIndex, CacheStats, CachedNodeInfo};
use crate::error::{Error, Result};
use crate::key::generate_cache_key;

const LOCK_FILE: &str = ".cache.lock";
const INDEX_FILE: &str = "index.json";
const NODES_DIR: &str = "nodes";
const CONTENT_DIR: &str = "content";
const ARCHIVE_FILE: &str = "archive";
const METADATA_FILE: &str = "metadata.json";

/// Content-addressable cache of custom node trees rooted at one directory.
///
/// Mutations (`cache_node`, `clear_cache`, access accounting) are serialized
/// across processes through an advisory lock on `<root>/.cache.lock`.
#[derive(Debug, Clone)]
pub struct NodeCache {
    root: PathBuf,
    lock_mode: LockMode,
}

impl NodeCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_mode: LockMode::default(),
        }
    }

    pub fn with_lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_key(spec: &CustomNodeSpec) -> String {
        generate_cache_key(&spec.url, spec.install_method, spec.git_ref.as_deref())
    }

    fn lock(&self) -> Result<DirLock> {
        Ok(DirLock::acquire(&self.root.join(LOCK_FILE), self.lock_mode)?)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(NODES_DIR).join(key)
    }

    fn content_dir(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join(CONTENT_DIR)
    }

    fn read_index(&self) -> Result<CacheIndex> {
        match io::read_json_opt::<CacheIndex>(&self.index_path()) {
            Ok(Some(index)) => Ok(index),
            Ok(None) => self.rebuild_index(),
            Err(e) => {
                tracing::warn!(error = %e, "cache index unreadable, rebuilding from entries");
                self.rebuild_index()
            }
        }
    }

    fn write_index(&self, index: &CacheIndex) -> Result<()> {
        Ok(io::write_json(&self.index_path(), index)?)
    }

    /// Reconstruct the index from each entry's `metadata.json`.
    fn rebuild_index(&self) -> Result<CacheIndex> {
        let mut index = CacheIndex::default();
        let nodes = self.root.join(NODES_DIR);
        let Ok(dirs) = fs::read_dir(&nodes) else {
            return Ok(index);
        };
        for dir in dirs.flatten() {
            if dir.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let metadata = dir.path().join(METADATA_FILE);
            match io::read_json_opt::<CachedNodeInfo>(&metadata) {
                Ok(Some(info)) => {
                    index.entries.insert(info.cache_key.clone(), info);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %metadata.display(), error = %e, "skipping corrupt cache entry"),
            }
        }
        Ok(index)
    }

    /// Path to the cached content for `spec`, recording the access.
    ///
    /// `None` on a miss or when the entry's content directory is gone.
    pub fn get_cached_path(&self, spec: &CustomNodeSpec) -> Result<Option<PathBuf>> {
        let key = Self::cache_key(spec);
        let content = self.content_dir(&key);
        if !content.is_dir() {
            return Ok(None);
        }

        let _lock = self.lock()?;
        let mut index = self.read_index()?;
        if !index.entries.contains_key(&key) {
            // Content without bookkeeping: recover it from metadata.json.
            let metadata = self.entry_dir(&key).join(METADATA_FILE);
            match io::read_json_opt::<CachedNodeInfo>(&metadata)? {
                Some(info) => {
                    index.entries.insert(key.clone(), info);
                }
                None => return Ok(None),
            }
        }
        if let Some(info) = index.entries.get_mut(&key) {
            info.access_count += 1;
            info.last_accessed = Utc::now();
        }
        self.write_index(&index)?;

        tracing::debug!(node = %spec.name, key, "cache hit");
        Ok(Some(content))
    }

    /// Store a copy of `source` (and optionally the original `archive`) for
    /// `spec`, replacing any previous entry with the same key.
    pub fn cache_node(
        &self,
        spec: &CustomNodeSpec,
        source: &Path,
        archive: Option<&Path>,
        source_info: serde_json::Value,
    ) -> Result<CachedNodeInfo> {
        if !source.is_dir() {
            return Err(Error::InvalidSource {
                path: source.to_path_buf(),
            });
        }
        let key = Self::cache_key(spec);

        // Stage outside the lock; only the swap and index update are locked.
        // Each call gets its own directory, removed on drop if never moved.
        let nodes = self.root.join(NODES_DIR);
        fs::create_dir_all(&nodes).map_err(|e| comfy_fs::Error::io(&nodes, e))?;
        let staging_dir = tempfile::Builder::new()
            .prefix(&format!(".{key}."))
            .suffix(".staging")
            .tempdir_in(&nodes)
            .map_err(|e| comfy_fs::Error::io(&nodes, e))?;
        let staging = staging_dir.path();
        let staged_content = staging.join(CONTENT_DIR);
        copy_dir_all(source, &staged_content)?;
        if let Some(archive) = archive {
            let target = staging.join(ARCHIVE_FILE);
            fs::copy(archive, &target).map_err(|e| comfy_fs::Error::io(&target, e))?;
        }

        let now = Utc::now();
        let info = CachedNodeInfo {
            cache_key: key.clone(),
            name: spec.name.clone(),
            install_method: spec.install_method,
            url: spec.url.clone(),
            git_ref: spec.git_ref.clone(),
            cached_at: now,
            last_accessed: now,
            access_count: 0,
            size_bytes: dir_size(&staged_content)?,
            content_hash: compute_tree_checksum(&staged_content)?,
            source_info,
        };
        io::write_json(&staging.join(METADATA_FILE), &info)?;

        let _lock = self.lock()?;
        move_dir(staging, &self.entry_dir(&key))?;
        let mut index = self.read_index()?;
        index.entries.insert(key.clone(), info.clone());
        self.write_index(&index)?;

        tracing::info!(node = %spec.name, key, size = info.size_bytes, "cached custom node");
        Ok(info)
    }

    /// Copy the cached tree for `spec` to `dest`, replacing `dest`.
    ///
    /// When the cached content is a single directory whose name contains the
    /// node name (`ComfyUI-Foo-1.2.3/` for `ComfyUI-Foo`), that directory's
    /// contents become `dest`. Returns `false` on a cache miss.
    pub fn copy_from_cache(&self, spec: &CustomNodeSpec, dest: &Path) -> Result<bool> {
        let Some(content) = self.get_cached_path(spec)? else {
            return Ok(false);
        };
        let source = flattened_root(&content, &spec.name)?;
        remove_path(dest)?;
        copy_dir_all(&source, dest)?;
        tracing::info!(node = %spec.name, dest = %dest.display(), "restored from cache");
        Ok(true)
    }

    /// All entries, ordered by name then key.
    pub fn list_cached_nodes(&self) -> Result<Vec<CachedNodeInfo>> {
        let mut entries: Vec<_> = self.read_index()?.entries.into_values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name).then(a.cache_key.cmp(&b.cache_key)));
        Ok(entries)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let index = self.read_index()?;
        Ok(CacheStats::from_entries(
            self.root.clone(),
            index.entries.values(),
        ))
    }

    /// Remove every entry named `name`, or everything when `None`.
    /// Returns the number of entries removed.
    pub fn clear_cache(&self, name: Option<&str>) -> Result<usize> {
        let _lock = self.lock()?;
        let mut index = self.read_index()?;

        let doomed: Vec<String> = index
            .entries
            .values()
            .filter(|info| name.is_none_or(|n| info.name == n))
            .map(|info| info.cache_key.clone())
            .collect();

        for key in &doomed {
            remove_path(&self.entry_dir(key))?;
            index.entries.remove(key);
        }
        if name.is_none() {
            // Also sweeps staging directories left by killed processes.
            remove_path(&self.root.join(NODES_DIR))?;
        }
        self.write_index(&index)?;

        tracing::info!(removed = doomed.len(), name = name.unwrap_or("*"), "cleared cache");
        Ok(doomed.len())
    }

    /// Recompute the content hash of `key` and compare it with the stored one.
    pub fn verify_cache_integrity(&self, key: &str) -> Result<bool> {
        let metadata = self.entry_dir(key).join(METADATA_FILE);
        let Some(info) = io::read_json_opt::<CachedNodeInfo>(&metadata)? else {
            return Err(Error::NotFound {
                key: key.to_string(),
            });
        };
        let content = self.content_dir(key);
        if !content.is_dir() {
            return Ok(false);
        }
        let actual = compute_tree_checksum(&content)?;
        let intact = actual == info.content_hash;
        if !intact {
            tracing::warn!(key, expected = %info.content_hash, actual, "cache entry modified");
        }
        Ok(intact)
    }

    /// Integrity of every indexed entry as `(entry, intact)`.
    pub fn verify_all(&self) -> Result<Vec<(CachedNodeInfo, bool)>> {
        self.list_cached_nodes()?
            .into_iter()
            .map(|info| match self.verify_cache_integrity(&info.cache_key) {
                Ok(intact) => Ok((info, intact)),
                Err(Error::NotFound { .. }) => Ok((info, false)),
                Err(e) => Err(e),
            })
            .collect()
    }
}

/// The directory to copy from, after undoing a version-qualified archive root.
fn flattened_root(content: &Path, name: &str) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(content)
        .map_err(|e| comfy_fs::Error::io(content, e))?
        .filter_map(|e| e.ok())
        .collect();
    if let [only] = entries.as_slice()
        && only.file_type().is_ok_and(|t| t.is_dir())
    {
        let sub = only.file_name().to_string_lossy().to_lowercase();
        if sub.contains(&name.to_lowercase()) {
            return Ok(only.path());
        }
    }
    Ok(content.to_path_buf())
}
