//! Fixed-delay retry used at every network boundary.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use log::warn;

use crate::error::AssistError;

/// How often, and how far apart, a failing network call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Wait between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(90),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// A single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn backoff(&self) -> FixedBackoff {
        FixedBackoff {
            policy: *self,
            attempts: 1,
        }
    }
}

/// [`Backoff`] that waits a constant delay and gives up after `max_attempts`.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    policy: RetryPolicy,
    attempts: u32,
}

impl Backoff for FixedBackoff {
    fn reset(&mut self) {
        self.attempts = 1;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.policy.delay)
    }
}

fn classify(err: AssistError) -> backoff::Error<AssistError> {
    if err.is_transient() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

fn notify(err: AssistError, wait: Duration) {
    warn!("{}; retrying in {:?}", err, wait);
}

/// Run a blocking operation under `policy`, retrying transient failures.
pub fn retry_blocking<T, F>(policy: &RetryPolicy, mut operation: F) -> Result<T, AssistError>
where
    F: FnMut() -> Result<T, AssistError>,
{
    backoff::retry_notify(policy.backoff(), || operation().map_err(classify), notify).map_err(|e| match e {
        backoff::Error::Permanent(err) => err,
        backoff::Error::Transient { err, .. } => err,
    })
}

/// Run an async operation under `policy`, retrying transient failures.
pub async fn retry_async<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, AssistError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AssistError>>,
{
    backoff::future::retry_notify(
        policy.backoff(),
        || {
            let attempt = operation();
            async move { attempt.await.map_err(classify) }
        },
        notify,
    )
    .await
}
