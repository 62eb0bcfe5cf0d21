//! Retry with exponential backoff
//!
//! Transient provider failures (network, rate limits, 5xx) are retried inside
//! the engine by wrapping any [`ModelProvider`] in a [`RetryingProvider`].
//! Callers above the engine never retry on their own.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::Result;
use crate::items::ModelResponse;
use crate::model::{ModelProvider, ModelRequest};
use crate::usage::Usage;

/// Backoff state for one logical operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: usize,
    next_delay: Duration,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            next_delay: config.initial_delay,
            config,
            attempt: 0,
        }
    }

    pub fn should_retry(&self) -> bool {
        self.attempt < self.config.max_retries
    }

    /// Retries taken so far.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Delay before the next retry; advances the backoff.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next_delay;
        self.attempt += 1;
        // f32 seconds are not exact at millisecond scale; scale in nanoseconds.
        let scaled =
            self.next_delay.as_nanos() as f64 * f64::from(self.config.backoff_multiplier);
        self.next_delay = if scaled >= self.config.max_delay.as_nanos() as f64 {
            self.config.max_delay
        } else {
            Duration::from_nanos(scaled.round() as u64)
        };
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next_delay = self.config.initial_delay;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
pub async fn retry_async<F, Fut, T>(mut operation: F, policy: &mut RetryPolicy) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    loop {
        match operation().await {
            Ok(result) => {
                if policy.attempt() > 0 {
                    debug!(attempts = policy.attempt() + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !error.is_retryable() {
                    debug!(%error, "non-retryable error");
                    return Err(error);
                }
                if !policy.should_retry() {
                    warn!(max_retries = policy.config.max_retries, %error, "retries exhausted");
                    return Err(error);
                }
                let delay = policy.next_delay();
                warn!(attempt = policy.attempt(), %error, ?delay, "transient failure, retrying");
                sleep(delay).await;
            }
        }
    }
}

/// A provider that retries transient failures of the provider it wraps.
pub struct RetryingProvider<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: ModelProvider> RetryingProvider<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ModelProvider> ModelProvider for RetryingProvider<P> {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)> {
        let mut policy = RetryPolicy::new(self.config.clone());
        retry_async(|| self.inner.complete(request.clone()), &mut policy).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
