//! Content-addressable store for installed custom nodes.
//!
//! Entries are keyed by a hash of `url|install_method|ref`, not by name, so
//! two manifests that reference the same artifact share one entry.
//!
//! ```text
//! <root>/
//!   .cache.lock
//!   index.json
//!   nodes/<key>/content/        verbatim node tree
//!   nodes/<key>/archive         original download, when there was one
//!   nodes/<key>/metadata.json
//! ```

pub mod entry;
pub mod error;
pub mod key;
pub mod store;

pub use entry::{CacheStats, CachedNodeInfo};
pub use error::{Error, Result};
pub use key::{CACHE_KEY_LEN, generate_cache_key};
pub use store::NodeCache;
