//! # Retry on quota exhaustion
//!
//! [`call_with_retry`] runs any fallible async operation under a
//! [`RetryConfig`]. Only failures that report themselves as rate-limited (see
//! [`RateLimited`]) are retried; everything else is handed back immediately as
//! [`RetryError::Unexpected`].
//!
//! ```rust,ignore
//! use mailsort::llm::{RetryConfig, call_with_retry};
//!
//! let reply = call_with_retry(&RetryConfig::default(), || model.prompt(prompt.clone())).await?;
//! ```

use crate::llm::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can tell whether they came from an exceeded quota.
pub trait RateLimited {
    /// `true` when waiting and trying again may succeed.
    fn is_rate_limited(&self) -> bool;

    /// How long the remote side asked us to wait, if it said.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Terminal outcome of a retried call that did not succeed.
#[derive(Error, Debug, PartialEq)]
pub enum RetryError<E> {
    /// Every attempt was rate-limited.
    #[error("quota still exceeded after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: E },
    /// The operation failed with something other than a rate limit; not retried.
    #[error("unexpected failure: {0}")]
    Unexpected(E),
}

impl<E> RetryError<E> {
    /// The underlying error of the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Unexpected(e) => e,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-rate-limit error, or
/// the attempt budget of `config` is spent.
///
/// Each wait is logged with the attempt count out of the budget. The wait
/// blocks the calling task for its whole duration.
pub async fn call_with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: RateLimited + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.attempts();
    let mut delays = config.delays();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, max_attempts, "Call succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_rate_limited() {
            warn!(attempt, error = %error, "Call failed with a non-retryable error");
            return Err(RetryError::Unexpected(error));
        }

        let Some(strategy_delay) = delays.next() else {
            warn!(attempts = attempt, "Max retries reached, aborting");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        };

        let wait = match error.retry_after() {
            Some(hint) if config.honor_retry_hint => hint,
            _ => strategy_delay,
        };
        warn!(
            attempt,
            max_attempts,
            wait_secs = wait.as_secs_f64(),
            "Quota exceeded, waiting before the next attempt"
        );
        tokio::time::sleep(wait).await;
    }
}
