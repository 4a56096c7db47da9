//! Filesystem primitives for comfy-env
//!
//! Provides atomic JSON persistence, cross-process advisory locking,
//! whole-tree content hashing and directory copy helpers shared by the
//! cache and the recreation pipeline.

pub mod checksum;
pub mod error;
pub mod io;
pub mod lock;
pub mod paths;
pub mod tree;

pub use checksum::{compute_content_checksum, compute_file_checksum, compute_tree_checksum};
pub use error::{Error, Result};
pub use lock::{DirLock, LockMode};
pub use paths::{CACHE_ROOT_ENV, CACHE_SUBPATH, default_cache_root, resolve_cache_root};
