// The `llm` module provides a trait for interacting with language models.

pub mod adapters;
pub mod config;
pub mod core;
pub mod retry;

pub use config::{RetryConfig, RetryStrategy};
pub use self::core::{LLM, LLMError};
pub use retry::{RateLimited, RetryError, call_with_retry};
