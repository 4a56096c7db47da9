//! Remote client configuration

use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_REGISTRY_URL: &str = "https://api.comfy.org";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Minimum spacing between calls to one target.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);
/// Spacing used against GitHub when a token is configured.
pub const AUTHENTICATED_MIN_INTERVAL: Duration = Duration::from_millis(100);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size for registry version listings and GitHub releases/tags.
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Settings shared by [`RegistryClient`](crate::RegistryClient) and
/// [`GitHubClient`](crate::GitHubClient).
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub registry_url: String,
    pub github_api_url: String,
    pub github_token: Option<String>,
    /// Registry spacing; GitHub spacing is derived from the token.
    pub min_interval: Duration,
    pub request_timeout: Duration,
    pub page_size: usize,
    pub max_pages: usize,
    pub retry: RetryPolicy,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            github_token: None,
            min_interval: DEFAULT_MIN_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
        }
    }
}

impl RemoteConfig {
    pub fn registry_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn github_interval(&self) -> Duration {
        if self.github_token.is_some() {
            AUTHENTICATED_MIN_INTERVAL.min(self.min_interval)
        } else {
            self.min_interval
        }
    }
}
