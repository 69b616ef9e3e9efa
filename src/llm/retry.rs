//! Retrying completion calls that failed for transient reasons.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::warn;

/// Attempts per completion, counting the first one.
pub const MAX_ATTEMPTS: u32 = 3;

/// How often and how patiently a backend call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Call `attempt` until it succeeds, fails with an error `should_retry`
    /// rejects, or `max_attempts` calls have failed. In the last case the
    /// final error is passed through `wrap_exhausted`.
    pub async fn run<T, E, Fut, F, R, W>(
        &self,
        mut attempt: F,
        should_retry: R,
        wrap_exhausted: W,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        W: FnOnce(E) -> E,
        E: std::fmt::Display,
    {
        let mut backoff = self.backoff();
        let mut n = 0;

        loop {
            n += 1;
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if !should_retry(&err) => return Err(err),
                Err(err) => err,
            };

            if n >= self.max_attempts {
                return Err(wrap_exhausted(err));
            }

            let wait = backoff.next_backoff().unwrap_or(self.max_interval);
            warn!(
                "Model call failed (attempt {}/{}): {}. Retrying in {:.1}s",
                n,
                self.max_attempts,
                err,
                wait.as_secs_f32()
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// [`RetryPolicy::run`] with the default policy.
pub async fn retry_with_backoff<T, E, Fut, F, R, W>(
    attempt: F,
    should_retry: R,
    wrap_exhausted: W,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    W: FnOnce(E) -> E,
    E: std::fmt::Display,
{
    RetryPolicy::default()
        .run(attempt, should_retry, wrap_exhausted)
        .await
}
