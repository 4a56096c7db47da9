//! Error types for comfy-remote

use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("Unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Rate limiting, server errors and connection/timeout failures are
    /// worth retrying; everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::Status { status, .. } => *status >= 500,
            Error::Request { source, .. } => source.is_connect() || source.is_timeout(),
            Error::ClientBuild(_) | Error::InvalidUrl { .. } | Error::Decode { .. } => false,
        }
    }

    /// Server-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let server = Error::Status {
            url: "u".into(),
            status: 503,
        };
        let client = Error::Status {
            url: "u".into(),
            status: 400,
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(
            Error::RateLimited {
                url: "u".into(),
                retry_after: None
            }
            .is_transient()
        );
    }
}
