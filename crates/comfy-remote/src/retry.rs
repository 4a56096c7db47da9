//! Exponential-backoff retry for remote calls

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;

use crate::error::{Error, Result};

/// Backoff parameters; the defaults mirror the documented policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub randomization_factor: f64,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_interval: Duration::from_secs(60),
            randomization_factor: 0.5,
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_multiplier(self.multiplier)
            .with_max_interval(self.max_interval)
            .with_randomization_factor(self.randomization_factor)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `op` until it succeeds, fails permanently, or the retry budget is
    /// spent. Only [`Error::is_transient`] failures are retried.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.max_retries;
        let mut attempt = 0u32;
        backoff::future::retry(self.backoff(), || {
            attempt += 1;
            let current = attempt;
            let fut = op();
            async move {
                fut.await.map_err(|e| {
                    if !e.is_transient() || current > max_retries {
                        return backoff::Error::permanent(e);
                    }
                    tracing::warn!(target_url = what, attempt = current, error = %e, "transient failure, retrying");
                    match e.retry_after() {
                        Some(delay) => backoff::Error::retry_after(e, delay),
                        None => backoff::Error::transient(e),
                    }
                })
            }
        })
        .await
    }
}
