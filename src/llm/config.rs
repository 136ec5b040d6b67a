use std::str::FromStr;
use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, FixedInterval, jitter};

/// Configuration for model-call retry behaviour.
///
/// Only rate-limit failures are ever retried; any other failure ends the call
/// on the first attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one. Zero behaves like one.
    pub max_attempts: usize,
    /// Wait between attempts; the first wait for the exponential strategies.
    pub base_delay: Duration,
    /// The retry strategy to use
    pub strategy: RetryStrategy,
    /// Wait for the provider's own `retryDelay` hint instead of the strategy delay.
    pub honor_retry_hint: bool,
}

/// Retry strategy for handling rate-limited model requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff without jitter
    ExponentialBackoff,
    /// Exponential backoff with jitter to avoid thundering herd
    ExponentialBackoffWithJitter,
}

impl FromStr for RetryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(RetryStrategy::Fixed),
            "exponential" => Ok(RetryStrategy::ExponentialBackoff),
            "jitter" | "exponential-jitter" => Ok(RetryStrategy::ExponentialBackoffWithJitter),
            other => Err(format!("unknown retry strategy '{other}'")),
        }
    }
}

impl Default for RetryConfig {
    /// Three attempts, one minute apart, which is what a free-tier Gemini quota needs.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            strategy: RetryStrategy::Fixed,
            honor_retry_hint: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom parameters.
    pub fn new(max_attempts: usize, base_delay: Duration, strategy: RetryStrategy) -> Self {
        Self {
            max_attempts,
            base_delay,
            strategy,
            honor_retry_hint: false,
        }
    }

    /// Create a configuration with no retry (a single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            strategy: RetryStrategy::Fixed,
            honor_retry_hint: false,
        }
    }

    /// Returns a copy of this configuration with a different attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns a copy that waits for provider retry hints when they are present.
    pub fn honoring_retry_hint(mut self) -> Self {
        self.honor_retry_hint = true;
        self
    }

    /// Attempt budget with the zero case folded into a single attempt.
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// The waits between consecutive attempts, one fewer than [`Self::attempts`].
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let waits = self.attempts() - 1;
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        match self.strategy {
            RetryStrategy::Fixed => Box::new(FixedInterval::new(self.base_delay).take(waits)),
            // `from_millis(2)` doubles each step; the factor scales the first wait to `base_delay`.
            RetryStrategy::ExponentialBackoff => Box::new(
                ExponentialBackoff::from_millis(2)
                    .factor((base_ms / 2).max(1))
                    .take(waits),
            ),
            RetryStrategy::ExponentialBackoffWithJitter => Box::new(
                ExponentialBackoff::from_millis(2)
                    .factor((base_ms / 2).max(1))
                    .map(jitter)
                    .take(waits),
            ),
        }
    }
}
