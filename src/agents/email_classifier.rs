use crate::agents::{Agent, AgentLog};
use crate::llm::{LLM, LLMError, RetryConfig, RetryError, call_with_retry};
use crate::models::{AnalysisFailure, EmailRecord};
use crate::prompts::PromptBuilder;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Fixed set of categories a single email can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailCategory {
    Personal,
    Work,
    Newsletter,
    Promotion,
    Social,
    Finance,
    Other,
}

impl EmailCategory {
    pub const ALL: [EmailCategory; 7] = [
        EmailCategory::Personal,
        EmailCategory::Work,
        EmailCategory::Newsletter,
        EmailCategory::Promotion,
        EmailCategory::Social,
        EmailCategory::Finance,
        EmailCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailCategory::Personal => "PERSONAL",
            EmailCategory::Work => "WORK",
            EmailCategory::Newsletter => "NEWSLETTER",
            EmailCategory::Promotion => "PROMOTION",
            EmailCategory::Social => "SOCIAL",
            EmailCategory::Finance => "FINANCE",
            EmailCategory::Other => "OTHER",
        }
    }

    /// Reads a model reply. Anything outside the fixed set is `Other`.
    pub fn from_reply(reply: &str) -> Self {
        reply.parse().unwrap_or(EmailCategory::Other)
    }
}

impl FromStr for EmailCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s
            .trim()
            .trim_matches(|c: char| c == '`' || c == '"' || c == '.')
            .to_uppercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| format!("unknown email category '{}'", s.trim()))
    }
}

impl fmt::Display for EmailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assigns one [`EmailCategory`] to a single email.
pub struct EmailClassifier {
    model: Box<dyn LLM>,
    prompts: PromptBuilder,
    retry: RetryConfig,
    log: AgentLog,
}

impl EmailClassifier {
    pub fn new(model: Box<dyn LLM>, prompts: PromptBuilder) -> Self {
        Self {
            model,
            prompts,
            retry: RetryConfig::default(),
            log: AgentLog::new("EmailClassifier"),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn classify(
        &mut self,
        email: &EmailRecord,
    ) -> Result<EmailCategory, AnalysisFailure> {
        let prompt = self
            .prompts
            .classification_prompt(email)
            .map_err(|e| AnalysisFailure::PromptRendering(e.to_string()))?;

        let model: &dyn LLM = self.model.as_ref();
        let reply = call_with_retry(&self.retry, move || model.prompt(prompt.clone()))
            .await
            .map_err(|e: RetryError<LLMError>| match e {
                RetryError::Exhausted { attempts, .. } => {
                    AnalysisFailure::ModelUnavailable { attempts }
                }
                RetryError::Unexpected(e) => AnalysisFailure::ModelCallFailed(e.to_string()),
            })?;

        let category = EmailCategory::from_reply(&reply);
        self.log.log(format!("Classified '{}' as {}", email.subject, category));
        Ok(category)
    }
}

#[async_trait::async_trait]
impl Agent for EmailClassifier {
    type Input = EmailRecord;
    type Output = Result<EmailCategory, AnalysisFailure>;

    fn name(&self) -> &str {
        self.log.name()
    }

    async fn execute(&mut self, email: EmailRecord) -> Self::Output {
        self.classify(&email).await
    }

    fn history(&self) -> &[String] {
        self.log.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RetryStrategy;
    use crate::testing::ScriptedLLM;
    use std::time::Duration;

    fn email() -> EmailRecord {
        EmailRecord {
            id: "m1".to_string(),
            subject: "Your statement is ready".to_string(),
            sender: "alerts@bank.com".to_string(),
            snippet: "Balance summary for September".to_string(),
            labels: vec!["INBOX".to_string()],
            ..Default::default()
        }
    }

    fn classifier(model: ScriptedLLM) -> EmailClassifier {
        EmailClassifier::new(Box::new(model), PromptBuilder::new().unwrap())
            .with_retry(RetryConfig::new(2, Duration::ZERO, RetryStrategy::Fixed))
    }

    #[test]
    fn replies_are_read_leniently() {
        assert_eq!(EmailCategory::from_reply("FINANCE"), EmailCategory::Finance);
        assert_eq!(EmailCategory::from_reply("  work\n"), EmailCategory::Work);
        assert_eq!(EmailCategory::from_reply("`Newsletter`."), EmailCategory::Newsletter);
        assert_eq!(EmailCategory::from_reply("Probably spam"), EmailCategory::Other);
        assert!("spam".parse::<EmailCategory>().is_err());
    }

    #[tokio::test]
    async fn classifies_with_the_rendered_prompt() {
        let model = ScriptedLLM::always_ok("FINANCE\n");
        let mut agent = classifier(model.clone());

        let category = agent.classify(&email()).await.unwrap();

        assert_eq!(category, EmailCategory::Finance);
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("From: alerts@bank.com"));
        assert!(prompt.contains("Subject: Your statement is ready"));
        assert_eq!(agent.history().len(), 1);
    }

    #[tokio::test]
    async fn unknown_reply_becomes_other() {
        let mut agent = classifier(ScriptedLLM::always_ok("I think this is a receipt"));

        let category = agent.execute(email()).await.unwrap();

        assert_eq!(category, EmailCategory::Other);
    }

    #[tokio::test]
    async fn quota_exhaustion_is_a_failure() {
        let model = ScriptedLLM::always_err(LLMError::RateLimited {
            message: "RESOURCE_EXHAUSTED".to_string(),
            retry_after: None,
        });
        let mut agent = classifier(model.clone());

        let err = agent.classify(&email()).await.unwrap_err();

        assert_eq!(err, AnalysisFailure::ModelUnavailable { attempts: 2 });
        assert_eq!(model.calls(), 2);
    }
}
