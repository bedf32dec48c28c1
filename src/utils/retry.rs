//! Retry utilities with exponential backoff for resilient API calls.
//!
//! The policy is independent of the network: it drives any async operation
//! whose output can say whether another attempt is worthwhile, and it waits
//! through a [`Sleeper`] so tests can observe the delays without waiting.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::models::PageResult;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    /// Unit of the backoff curve. Attempt `n` waits `base * (2^n + jitter)`.
    pub base_delay: Duration,
    /// Add `uniform(0, 1) * base_delay` to every delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Set the maximum number of retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff unit
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt `attempt` (0-indexed), saturating at `Duration::MAX`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = 2f64.powi(attempt.min(30) as i32);
        let jitter = if self.jitter { rand::random::<f64>() } else { 0.0 };
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * (exponential + jitter))
            .unwrap_or(Duration::MAX)
    }
}

/// Outcome of an operation that can ask to be retried
pub trait Retryable {
    /// Whether this outcome is a transient failure
    fn should_retry(&self) -> bool;
}

impl Retryable for PageResult {
    fn should_retry(&self) -> bool {
        self.status.is_retryable()
    }
}

/// Blocking wait used between attempts and between requests
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Final outcome with the number of attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Details of a scheduled retry, passed to the `on_retry` callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryNotice {
    /// The attempt that failed (1-based)
    pub attempt: u32,
    /// Attempts left after this wait
    pub remaining: u32,
    pub delay: Duration,
}

/// Run `operation` until it succeeds, fails terminally, or attempts run out.
///
/// The closure receives the 0-based attempt number. The last outcome is
/// always returned, retryable or not; exhaustion is not an error at this level.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation: F,
) -> Attempted<T>
where
    T: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
{
    with_retry_notify(policy, sleeper, operation, |_, _| {}).await
}

/// Like [`with_retry`], calling `on_retry` with the failed outcome before each wait
pub async fn with_retry_notify<T, F, Fut, N>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
    mut on_retry: N,
) -> Attempted<T>
where
    T: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    N: FnMut(&T, RetryNotice),
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        let value = operation(attempt).await;
        let attempts = attempt + 1;

        if !value.should_retry() {
            if attempts > 1 {
                tracing::debug!("Operation settled on attempt {}/{}", attempts, max_attempts);
            }
            return Attempted { value, attempts };
        }

        if attempts >= max_attempts {
            tracing::warn!("Giving up after {} attempts", attempts);
            return Attempted { value, attempts };
        }

        let notice = RetryNotice {
            attempt: attempts,
            remaining: max_attempts - attempts,
            delay: policy.delay_for(attempt),
        };
        tracing::debug!(
            "Transient failure on attempt {}/{}, retrying in {:?} ({} attempts left)",
            attempts,
            max_attempts,
            notice.delay,
            notice.remaining
        );
        on_retry(&value, notice);

        sleeper.sleep(notice.delay).await;
        attempt += 1;
    }
}
