//! Activity runner: timeout and retry policy applied to every saga step.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ActivityError;

/// Default start-to-close timeout of one activity attempt.
pub const DEFAULT_START_TO_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default attempt budget: the first try plus one retry.
pub const DEFAULT_MAXIMUM_ATTEMPTS: u32 = 2;

/// How failed attempts are retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub maximum_attempts: u32,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_coefficient: f64,
    /// Upper bound on the delay.
    pub maximum_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: DEFAULT_MAXIMUM_ATTEMPTS,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self
            .initial_interval
            .mul_f64(self.backoff_coefficient.max(1.0).powi(exponent));
        delay.min(self.maximum_interval)
    }
}

/// Per-invocation options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityOptions {
    pub start_to_close_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close_timeout: DEFAULT_START_TO_CLOSE_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// What an activity knows about the attempt it is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityContext {
    pub activity: &'static str,
    /// 1-based attempt number.
    pub attempt: u32,
    pub maximum_attempts: u32,
}

impl ActivityContext {
    /// Returns true if a failure of this attempt will not be retried.
    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.maximum_attempts
    }
}

/// The "execute step" capability the saga runs on.
///
/// An implementation resolves each call exactly once, to the activity's
/// result or to a definitive error, however many attempts it made. A durable
/// workflow engine can implement this trait; [`RetryingActivityRunner`] is the
/// in-process at-least-once version.
#[async_trait]
pub trait ActivityRunner: Send + Sync {
    async fn run<T, F, Fut>(&self, name: &'static str, activity: F) -> Result<T, ActivityError>
    where
        T: Send,
        F: Fn(ActivityContext) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, ActivityError>> + Send;
}

/// Runs activities in-process with a per-attempt timeout and bounded retries.
#[derive(Debug, Clone, Default)]
pub struct RetryingActivityRunner {
    options: ActivityOptions,
}

impl RetryingActivityRunner {
    pub fn new(options: ActivityOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ActivityOptions {
        &self.options
    }
}

#[async_trait]
impl ActivityRunner for RetryingActivityRunner {
    async fn run<T, F, Fut>(&self, name: &'static str, activity: F) -> Result<T, ActivityError>
    where
        T: Send,
        F: Fn(ActivityContext) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, ActivityError>> + Send,
    {
        let policy = self.options.retry_policy;
        let timeout = self.options.start_to_close_timeout;
        let maximum_attempts = policy.maximum_attempts.max(1);
        let mut attempt = 1;

        loop {
            let ctx = ActivityContext {
                activity: name,
                attempt,
                maximum_attempts,
            };
            metrics::counter!("activity_attempts_total", "activity" => name).increment(1);

            let err = match tokio::time::timeout(timeout, activity(ctx)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => ActivityError::Timeout(timeout),
            };

            if !err.is_retryable() {
                tracing::warn!(activity = name, attempt, error = %err, "activity failed definitively");
                return Err(err);
            }
            if ctx.is_final_attempt() {
                tracing::warn!(activity = name, attempt, error = %err, "activity retries exhausted");
                return Err(err);
            }

            let delay = policy.delay_after(attempt);
            tracing::info!(
                activity = name,
                attempt,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "activity failed, retrying"
            );
            metrics::counter!("activity_retries_total", "activity" => name).increment(1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
