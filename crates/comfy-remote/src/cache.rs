//! In-memory response cache keyed by URL

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// Remembers decoded bodies and 404s for the lifetime of a client.
///
/// A stored `None` is a cached "not found".
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Option<Value>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(None)` is a cached 404; `None` means nothing is cached.
    pub fn get(&self, url: &str) -> Option<Option<Value>> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(url).cloned())
    }

    pub fn insert(&self, url: impl Into<String>, body: Option<Value>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(url.into(), body);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
