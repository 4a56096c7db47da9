//! Read-only clients for the remote metadata services consulted during
//! detection: the extension registry and the source-hosting platform.
//!
//! Each client owns its own [`RateLimiter`] and [`ResponseCache`], so the two
//! targets are throttled independently. Transient failures are retried with
//! exponential backoff; a 404 is an ordinary negative answer.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
mod http;
pub mod limiter;
pub mod registry;
pub mod retry;

pub use cache::ResponseCache;
pub use config::RemoteConfig;
pub use error::{Error, Result};
pub use github::{GitHubClient, GitHubRelease, GitHubRepo, GitHubTag, parse_github_url};
pub use limiter::RateLimiter;
pub use registry::{RegistryClient, RegistryNode, RegistryVersion};
pub use retry::RetryPolicy;
