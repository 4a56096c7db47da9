//! Shared GET-JSON plumbing: rate limiting, retry, status classification and
//! response caching.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::config::DEFAULT_CONNECT_TIMEOUT;
use crate::error::{Error, Result};
use crate::limiter::RateLimiter;
use crate::retry::RetryPolicy;

const USER_AGENT: &str = concat!("comfy-env/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
pub(crate) struct JsonClient {
    client: reqwest::Client,
    limiter: RateLimiter,
    cache: ResponseCache,
    retry: RetryPolicy,
}

impl JsonClient {
    pub(crate) fn new(
        min_interval: Duration,
        timeout: Duration,
        retry: RetryPolicy,
        accept: &'static str,
        bearer: Option<&str>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        if let Some(token) = bearer {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                Error::InvalidUrl {
                    url: "<authorization header>".into(),
                    reason: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(Error::ClientBuild)?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(min_interval),
            cache: ResponseCache::new(),
            retry,
        })
    }

    /// GET `url` as JSON. `Ok(None)` means the resource does not exist.
    pub(crate) async fn get_value(&self, url: &str) -> Result<Option<Value>> {
        if let Some(cached) = self.cache.get(url) {
            tracing::trace!(url, "response cache hit");
            return Ok(cached);
        }

        let body = self.retry.run(url, || self.fetch(url)).await?;
        self.cache.insert(url, body.clone());
        Ok(body)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        match self.get_value(url).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| Error::Decode {
                    url: url.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Option<Value>> {
        self.limiter.acquire().await;
        tracing::debug!(url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| Error::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if is_rate_limited(status, response.headers()) {
            return Err(Error::RateLimited {
                url: url.to_string(),
                retry_after: retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|source| Error::Request {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| Error::Decode {
                url: url.to_string(),
                source,
            })
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && headers
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim() == "0"))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
