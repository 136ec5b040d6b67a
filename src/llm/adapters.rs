use crate::llm::core::{LLM, LLMError};
use async_trait::async_trait;
use rig::{agent::Agent as RigAgent, completion::CompletionModel};
use tracing::debug;

/// Implementation of the `LLM` trait for `rig::Agent`.
///
/// Any `rig` agent, e.g. one built on the Gemini provider, can drive the
/// analyzer. Provider errors are classified so quota exhaustion surfaces as
/// [`LLMError::RateLimited`].
///
/// ```rust,ignore
/// use rig::{client::CompletionClient, prelude::ProviderClient, providers::gemini};
///
/// let agent = gemini::Client::from_env()
///     .agent(gemini::completion::GEMINI_2_0_FLASH)
///     .build();
/// let model: Box<dyn mailsort::LLM> = Box::new(agent);
/// ```
#[async_trait]
impl<M> LLM for RigAgent<M>
where
    M: CompletionModel,
{
    async fn prompt(&self, text: String) -> Result<String, LLMError> {
        rig::completion::Prompt::prompt(self, text)
            .await
            .map(|response| response.to_string())
            .map_err(|e| {
                debug!(error = %e, "Model call failed");
                LLMError::from_provider_message(e.to_string())
            })
    }
}
