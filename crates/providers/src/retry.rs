//! Retrying completion client.
//!
//! Wraps any [`CompletionClient`] and retries transient failures with
//! exponential backoff. Non-retryable errors (auth, 4xx, not configured)
//! are returned on the first attempt.

use std::sync::Arc;
use std::time::Duration;

use agentry_config::RetrySettings;
use agentry_core::error::CompletionError;
use agentry_core::provider::{CompletionClient, CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

/// Backoff parameters for [`RetryingClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Fraction of the delay that may be shaved off at random, in `[0, 1]`
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            multiplier: settings.backoff_multiplier,
            jitter: if settings.jitter { 0.25 } else { 0.0 },
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based), honouring a rate-limit hint.
    pub fn backoff(&self, retry: u32, error: &CompletionError) -> Duration {
        #[allow(clippy::cast_possible_wrap)]
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(retry as i32);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let factor = if self.jitter > 0.0 {
            let min_factor = (1.0 - self.jitter).clamp(0.0, 1.0);
            rand::thread_rng().gen_range(min_factor..=1.0)
        } else {
            1.0
        };
        let mut delay = Duration::from_secs_f64(capped * factor);

        if let CompletionError::RateLimited { retry_after_secs } = error {
            let hinted = Duration::from_secs(*retry_after_secs).min(self.max_backoff);
            delay = delay.max(hinted);
        }

        delay
    }
}

/// A [`CompletionClient`] that retries its inner client.
pub struct RetryingClient {
    inner: Arc<dyn CompletionClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn CompletionClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl CompletionClient for RetryingClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let error = match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(client = %self.inner.name(), attempt, "Completion succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            let retries_used = attempt - 1;
            if !error.is_retryable() || retries_used >= self.policy.max_retries {
                if attempt == 1 {
                    return Err(error);
                }
                warn!(client = %self.inner.name(), attempts = attempt, error = %error, "Giving up on completion");
                return Err(CompletionError::RetryFailed {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.backoff(retries_used, &error);
            warn!(
                client = %self.inner.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Completion failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
