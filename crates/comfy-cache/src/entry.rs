//! Cache entry records and the on-disk index

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use comfy_manifest::{CustomNodeSpec, InstallMethod};
use serde::{Deserialize, Serialize};

/// Bookkeeping for one cached node. Stored both as the entry's
/// `metadata.json` and inside `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedNodeInfo {
    pub cache_key: String,
    pub name: String,
    pub install_method: InstallMethod,
    pub url: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    pub cached_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
    pub size_bytes: u64,
    /// `sha256:<hex>` over the `content/` tree.
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub source_info: serde_json::Value,
}

impl CachedNodeInfo {
    /// The manifest entry this cache entry was created from.
    pub fn to_spec(&self) -> CustomNodeSpec {
        CustomNodeSpec {
            name: self.name.clone(),
            install_method: self.install_method,
            url: self.url.clone(),
            git_ref: self.git_ref.clone(),
            has_post_install: false,
        }
    }
}

/// `index.json`: every entry keyed by cache key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct CacheIndex {
    #[serde(default)]
    pub entries: BTreeMap<String, CachedNodeInfo>,
}

/// Aggregate view returned by [`NodeCache::stats`](crate::NodeCache::stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub root: PathBuf,
    pub total_nodes: usize,
    pub total_size_bytes: u64,
    pub total_accesses: u64,
    pub by_method: BTreeMap<String, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

impl CacheStats {
    pub(crate) fn from_entries<'a>(
        root: PathBuf,
        entries: impl IntoIterator<Item = &'a CachedNodeInfo>,
    ) -> Self {
        let mut stats = CacheStats {
            root,
            total_nodes: 0,
            total_size_bytes: 0,
            total_accesses: 0,
            by_method: BTreeMap::new(),
            oldest: None,
            newest: None,
        };
        for entry in entries {
            stats.total_nodes += 1;
            stats.total_size_bytes += entry.size_bytes;
            stats.total_accesses += entry.access_count;
            *stats
                .by_method
                .entry(entry.install_method.as_str().to_string())
                .or_default() += 1;
            stats.oldest = Some(stats.oldest.map_or(entry.cached_at, |t| t.min(entry.cached_at)));
            stats.newest = Some(stats.newest.map_or(entry.cached_at, |t| t.max(entry.cached_at)));
        }
        stats
    }
}
