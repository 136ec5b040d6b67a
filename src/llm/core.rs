use crate::llm::retry::RateLimited;
use crate::parsing::extract_json_object;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const RETRY_INFO_TYPE: &str = "type.googleapis.com/google.rpc.RetryInfo";

/// A custom error type for LLM operations.
///
/// Provider failures are split in two: quota exhaustion, which is worth
/// waiting out, and everything else, which is not.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LLMError {
    /// The provider rejected the call because a quota or throughput limit was hit.
    ///
    /// `retry_after` carries the provider's own back-off hint when it sent one.
    #[error("Model quota exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    /// An error occurred while prompting the model.
    #[error("Failed to prompt the model: {0}")]
    PromptError(String),
}

impl LLMError {
    /// Classifies a raw provider error message.
    ///
    /// Google APIs embed a JSON error body in their messages; a body whose
    /// `error.code` is 429 or whose `error.status` is `RESOURCE_EXHAUSTED`
    /// marks the failure as rate-limited. Anything else is a plain prompt error.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let body = extract_json_object(&message)
            .and_then(|fragment| serde_json::from_str::<Value>(fragment).ok());

        let Some(body) = body else {
            if message.contains("RESOURCE_EXHAUSTED") {
                return LLMError::RateLimited {
                    message,
                    retry_after: None,
                };
            }
            return LLMError::PromptError(message);
        };

        let error = &body["error"];
        let rate_limited = error["code"].as_i64() == Some(429)
            || error["status"].as_str() == Some("RESOURCE_EXHAUSTED");

        if rate_limited {
            let retry_after = retry_delay_hint(error);
            LLMError::RateLimited {
                message,
                retry_after,
            }
        } else {
            LLMError::PromptError(message)
        }
    }
}

/// Reads `retryDelay` out of a Google `RetryInfo` error detail, e.g. `"26s"`.
fn retry_delay_hint(error: &Value) -> Option<Duration> {
    error["details"]
        .as_array()?
        .iter()
        .filter(|detail| detail["@type"].as_str() == Some(RETRY_INFO_TYPE))
        .find_map(|detail| {
            detail["retryDelay"]
                .as_str()
                .and_then(|delay| humantime::parse_duration(delay).ok())
        })
}

impl RateLimited for LLMError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, LLMError::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LLMError::RateLimited { retry_after, .. } => *retry_after,
            LLMError::PromptError(_) => None,
        }
    }
}

/// A trait that defines the contract for any model client the agents can use.
///
/// # Examples
///
/// ```rust
/// use mailsort::llm::{LLM, LLMError};
/// use async_trait::async_trait;
///
/// struct EchoLLM;
///
/// #[async_trait]
/// impl LLM for EchoLLM {
///     async fn prompt(&self, text: String) -> Result<String, LLMError> {
///         Ok(format!("echo: {}", text))
///     }
/// }
/// ```
#[async_trait]
pub trait LLM: Send + Sync {
    /// Sends a text prompt to the language model and gets its text reply.
    ///
    /// Implementations should report quota exhaustion as
    /// [`LLMError::RateLimited`] so the retry wrapper can wait it out.
    async fn prompt(&self, text: String) -> Result<String, LLMError>;
}
