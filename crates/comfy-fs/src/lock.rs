//! Cross-process advisory locking on a dedicated lock file
//!
//! The lock is held for the lifetime of [`DirLock`] and released on drop.
//! Two acquisition modes exist: [`LockMode::Blocking`] parks the calling
//! process in the OS until the lock is free, [`LockMode::Bounded`] polls with
//! exponential backoff and gives up after the timeout.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;

use crate::{Error, Result};

/// How [`DirLock::acquire`] waits for a contended lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Block in the OS until the lock is granted.
    Blocking,
    /// Poll with backoff and fail with [`Error::LockTimeout`] after `timeout`.
    Bounded { timeout: Duration },
}

impl Default for LockMode {
    fn default() -> Self {
        Self::Bounded {
            timeout: Duration::from_secs(60),
        }
    }
}

/// An exclusive advisory lock held on a lock file.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Acquire an exclusive lock on `lock_path`, creating the file if needed.
    pub fn acquire(lock_path: &Path, mode: LockMode) -> Result<Self> {
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| Error::io(lock_path, e))?;

        match mode {
            LockMode::Blocking => {
                file.lock_exclusive().map_err(|_| Error::LockFailed {
                    path: lock_path.to_path_buf(),
                })?;
            }
            LockMode::Bounded { timeout } => {
                let policy = ExponentialBackoffBuilder::new()
                    .with_initial_interval(Duration::from_millis(10))
                    .with_max_interval(Duration::from_millis(500))
                    .with_max_elapsed_time(Some(timeout))
                    .build();
                let contended = fs2::lock_contended_error().kind();
                backoff::retry(policy, || {
                    file.try_lock_exclusive().map_err(|e| {
                        if e.kind() == contended {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                })
                .map_err(|e| match e {
                    backoff::Error::Transient { .. } => Error::LockTimeout {
                        path: lock_path.to_path_buf(),
                        timeout,
                    },
                    backoff::Error::Permanent(_) => Error::LockFailed {
                        path: lock_path.to_path_buf(),
                    },
                })?;
            }
        }

        tracing::trace!(path = %lock_path.display(), "acquired lock");
        Ok(Self {
            file,
            path: lock_path.to_path_buf(),
        })
    }

    /// Path of the underlying lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}
