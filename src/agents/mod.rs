// The `agents` module provides the agents that put the model to work on mail.

pub mod email_analyzer;
pub mod email_classifier;

use async_trait::async_trait;
use tracing::info;

pub use email_analyzer::EmailAnalyzer;
pub use email_classifier::{EmailCategory, EmailClassifier};

/// Common shape of every agent: a name, one task, and a record of what it did.
#[async_trait]
pub trait Agent: Send {
    type Input: Send;
    type Output;

    fn name(&self) -> &str;

    /// Performs the agent's task.
    async fn execute(&mut self, input: Self::Input) -> Self::Output;

    /// Messages the agent logged so far, oldest first.
    fn history(&self) -> &[String];
}

/// Named log that both emits through `tracing` and keeps the lines in memory.
#[derive(Debug, Clone)]
pub struct AgentLog {
    name: String,
    history: Vec<String>,
}

impl AgentLog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(agent = %self.name, "{}", message);
        self.history.push(message);
    }

    pub fn entries(&self) -> &[String] {
        &self.history
    }
}
