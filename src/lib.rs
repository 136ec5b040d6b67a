//! # mailsort: propose and apply mailbox folders with a language model.
//!
//! The pipeline fetches recent message metadata from a mailbox, asks a model to
//! group the batch into folder categories, and can apply the proposed folders
//! back to the mailbox as labels.

/// The `agents` module provides the email analysis and classification agents.
pub mod agents;
/// The `config` module provides the settings the pipeline is built from.
pub mod config;
/// The `llm` module provides a trait for interacting with language models.
pub mod llm;
/// The `mailbox` module provides the mailbox client boundary and its Gmail implementation.
pub mod mailbox;
/// The `models` module provides the email and analysis data types.
pub mod models;
/// The `parsing` module extracts category proposals from free-text model replies.
pub mod parsing;
/// The `prompts` module renders the fixed prompt templates.
pub mod prompts;
/// The `services` module provides the cached email data service.
pub mod services;
/// The `utils` module provides authentication and templating helpers.
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use agents::{Agent, EmailAnalyzer, EmailClassifier};
pub use config::Settings;
pub use llm::{LLM, LLMError, RetryConfig, RetryStrategy};
pub use mailbox::{GmailMailbox, MailboxClient};
pub use models::{AnalysisFailure, AnalysisResult, CategoryProposal, EmailRecord};
pub use services::EmailDataService;
pub use utils::context_hub::ContextHub;
