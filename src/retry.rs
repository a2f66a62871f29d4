// src/retry.rs
//! Shared retry policy and per-provider call spacing.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::config::RetrySettings;
use crate::error::SourceError;

/// Bounded exponential backoff: `base * 2^(attempt-1)`, capped, plus jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(s: &RetrySettings) -> Self {
        Self {
            max_retries: s.max_retries,
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter: Duration::from_millis(s.jitter_ms),
            max_rate_limit_wait: Duration::from_secs(s.max_rate_limit_wait_secs),
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            max_rate_limit_wait: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let ms = self.jitter.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. Rate-limit waits longer than
    /// `max_rate_limit_wait` are skipped instead of slept.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.max_retries {
                error!(
                    provider = label,
                    attempts = attempt + 1,
                    error = %err,
                    "retries exhausted"
                );
                return Err(err);
            }
            attempt += 1;

            let rate_wait = match &err {
                SourceError::RateLimited { retry_after } => *retry_after,
                _ => None,
            };
            if let Some(wait) = rate_wait {
                if wait > self.max_rate_limit_wait {
                    warn!(
                        provider = label,
                        wait_secs = wait.as_secs(),
                        "rate-limit reset window too long, skipping"
                    );
                    return Err(err);
                }
            }
            let delay = rate_wait.unwrap_or_else(|| self.backoff(attempt) + self.jitter());

            warn!(
                provider = label,
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Minimum spacing between consecutive calls of one provider instance.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until the next call slot. Callers are served in lock order.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let next = prev + self.min_interval;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }
}
