use crate::agents::{Agent, AgentLog};
use crate::config::Settings;
use crate::llm::{LLM, LLMError, RetryConfig, RetryError, call_with_retry};
use crate::mailbox::{FailedMessage, MailboxClient};
use crate::models::{AnalysisFailure, AnalysisResult, CategoryProposal, EmailRecord};
use crate::parsing::parse_categories;
use crate::prompts::PromptBuilder;
use crate::services::{EmailDataService, SortOutcome};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Proposes folder categories for the most recent emails.
///
/// One [`EmailAnalyzer::execute`] call walks
/// fetch → prompt → model call (with retry) → parse, and always ends in an
/// [`AnalysisResult`]. Failures at any step are reported in its `error` field
/// instead of being returned as `Err`.
pub struct EmailAnalyzer {
    data_service: EmailDataService,
    model: Box<dyn LLM>,
    prompts: PromptBuilder,
    retry: RetryConfig,
    prompt_batch_size: usize,
    validate_email_ids: bool,
    log: AgentLog,
}

impl EmailAnalyzer {
    pub fn new(
        mailbox: Box<dyn MailboxClient>,
        model: Box<dyn LLM>,
        prompts: PromptBuilder,
    ) -> Self {
        let defaults = Settings::default();
        Self {
            data_service: EmailDataService::new(mailbox),
            model,
            prompts,
            retry: defaults.retry,
            prompt_batch_size: defaults.prompt_batch_size,
            validate_email_ids: defaults.validate_email_ids,
            log: AgentLog::new("EmailAnalyzer"),
        }
    }

    /// Applies the retry, batch and validation settings.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.retry = settings.retry.clone();
        self.prompt_batch_size = settings.prompt_batch_size;
        self.validate_email_ids = settings.validate_email_ids;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_prompt_batch_size(mut self, size: usize) -> Self {
        self.prompt_batch_size = size;
        self
    }

    /// Cross-check proposed ids against the fetched batch.
    pub fn with_email_id_validation(mut self, enabled: bool) -> Self {
        self.validate_email_ids = enabled;
        self
    }

    pub fn data_service(&self) -> &EmailDataService {
        &self.data_service
    }

    pub fn data_service_mut(&mut self) -> &mut EmailDataService {
        &mut self.data_service
    }

    /// Analyzes up to `num_emails` recent emails with the configured retry budget.
    pub async fn execute(&mut self, num_emails: usize) -> AnalysisResult {
        let attempts = self.retry.max_attempts;
        self.execute_with_retries(num_emails, attempts).await
    }

    /// Analyzes up to `num_emails` recent emails, calling the model at most `max_retries` times.
    pub async fn execute_with_retries(
        &mut self,
        num_emails: usize,
        max_retries: usize,
    ) -> AnalysisResult {
        // Fetching
        let emails = match self.data_service.fetch_emails(num_emails, true).await {
            Ok(emails) => emails,
            Err(e) => {
                self.log.log(format!("Failed to fetch emails: {e}"));
                return AnalysisResult::failed(AnalysisFailure::MailboxUnavailable(e.to_string()));
            }
        };
        if emails.is_empty() {
            self.log.log("No emails found.");
            return AnalysisResult::failed(AnalysisFailure::NoEmailsFound);
        }

        // Prompting
        let log_output = self.data_service.format_for_log(&emails);
        self.log.log(format!("Analyzing {} emails: \n\n{}", emails.len(), log_output));
        let email_text = self.data_service.format_for_prompt(&emails, self.prompt_batch_size);
        let prompt = match self.prompts.analysis_prompt(&email_text) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.log.log(format!("Failed to render prompt: {e}"));
                return AnalysisResult::failed(AnalysisFailure::PromptRendering(e.to_string()));
            }
        };

        // Calling the model
        let retry = self.retry.clone().with_max_attempts(max_retries);
        let model: &dyn LLM = self.model.as_ref();
        let raw = match call_with_retry(&retry, move || model.prompt(prompt.clone())).await {
            Ok(raw) => raw,
            Err(e) => {
                let failure = model_failure(e);
                self.log.log(failure.to_string());
                return AnalysisResult::failed(failure);
            }
        };
        self.log.log(format!("Raw model response: {raw:?}"));

        // Parsing
        let mut result = parse_categories(&raw);
        if let Some(error) = &result.error {
            self.log.log(format!("Failed to parse model response: {error}"));
            return result;
        }
        if self.validate_email_ids {
            result.categories = retain_known_ids(result.categories, &emails);
        }

        self.log.log(format!("Found {} categories", result.categories.len()));
        for category in &result.categories {
            self.log.log(format!(
                "{}: {} | emails: [{}] | count: {}",
                category.name,
                category.description,
                category.email_ids.join(", "),
                category.count
            ));
        }
        result
    }

    /// Files the emails of every proposed category into a folder of the same name.
    ///
    /// Nothing is retried. A category whose folder cannot be created or applied
    /// reports all its emails as failed; the remaining categories still run.
    pub async fn apply_categories(&mut self, result: &AnalysisResult) -> Vec<SortOutcome> {
        let mut outcomes = Vec::with_capacity(result.categories.len());
        for category in &result.categories {
            let outcome = match self
                .data_service
                .sort_emails(&category.email_ids, &category.name)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(folder = %category.name, error = %e, "Failed to sort category");
                    SortOutcome {
                        folder: category.name.clone(),
                        label_id: None,
                        success: Vec::new(),
                        failed: category
                            .email_ids
                            .iter()
                            .map(|id| FailedMessage {
                                id: id.clone(),
                                error: e.to_string(),
                            })
                            .collect(),
                    }
                }
            };
            self.log.log(format!(
                "Sorted into '{}': {} moved, {} failed",
                outcome.folder,
                outcome.success.len(),
                outcome.failed.len()
            ));
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn model_failure(error: RetryError<LLMError>) -> AnalysisFailure {
    match error {
        RetryError::Exhausted { attempts, .. } => AnalysisFailure::ModelUnavailable { attempts },
        RetryError::Unexpected(e) => AnalysisFailure::ModelCallFailed(e.to_string()),
    }
}

/// Drops ids the batch does not contain, recounts, and removes emptied categories.
fn retain_known_ids(
    categories: Vec<CategoryProposal>,
    emails: &[EmailRecord],
) -> Vec<CategoryProposal> {
    let known: HashSet<&str> = emails.iter().map(|email| email.id.as_str()).collect();
    categories
        .into_iter()
        .filter_map(|mut category| {
            let before = category.email_ids.len();
            category.email_ids.retain(|id| known.contains(id.as_str()));
            let dropped = before - category.email_ids.len();
            if dropped > 0 {
                warn!(
                    category = %category.name,
                    dropped,
                    "Dropped email ids not in the fetched batch"
                );
            }
            category.count = category.email_ids.len() as i64;
            if category.email_ids.is_empty() {
                debug!(category = %category.name, "Category has no known emails, removing");
                None
            } else {
                Some(category)
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl Agent for EmailAnalyzer {
    type Input = usize;
    type Output = AnalysisResult;

    fn name(&self) -> &str {
        self.log.name()
    }

    async fn execute(&mut self, num_emails: usize) -> AnalysisResult {
        EmailAnalyzer::execute(self, num_emails).await
    }

    fn history(&self) -> &[String] {
        self.log.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RetryStrategy;
    use crate::testing::{ScriptedLLM, StubMailbox, stub_message};
    use std::time::Duration;

    const GROUPED_REPLY: &str = r#"Here is my suggestion:
```json
{"categories": [{"name": "Work", "description": "Messages from colleagues", "email_ids": ["a1", "a2", "a3"], "count": 3}]}
```"#;

    fn three_messages() -> StubMailbox {
        StubMailbox::new(vec![
            stub_message("a1", "Sprint planning", "pm@corp.com", "Agenda for Monday", &["INBOX"]),
            stub_message("a2", "Code review", "dev@corp.com", "Please look at PR 12", &["INBOX"]),
            stub_message("a3", "Offsite", "hr@corp.com", "Travel details", &["INBOX", "IMPORTANT"]),
        ])
        .with_labels(&[("INBOX", "INBOX"), ("IMPORTANT", "IMPORTANT")])
    }

    fn analyzer(mailbox: StubMailbox, model: ScriptedLLM) -> EmailAnalyzer {
        EmailAnalyzer::new(Box::new(mailbox), Box::new(model), PromptBuilder::new().unwrap())
            .with_retry(RetryConfig::new(3, Duration::ZERO, RetryStrategy::Fixed))
    }

    fn quota_error() -> LLMError {
        LLMError::RateLimited {
            message: "429 Too Many Requests".to_string(),
            retry_after: None,
        }
    }

    #[tokio::test]
    async fn groups_all_emails_end_to_end() {
        let model = ScriptedLLM::always_ok(GROUPED_REPLY);
        let mut agent = analyzer(three_messages(), model.clone());

        let result = agent.execute(3).await;

        assert_eq!(result.error, None);
        assert_eq!(result.categories.len(), 1);
        assert_eq!(result.categories[0].name, "Work");
        assert_eq!(result.categories[0].email_ids, vec!["a1", "a2", "a3"]);
        assert_eq!(model.calls(), 1);

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Subject: Sprint planning"));
        assert!(prompt.contains("From: hr@corp.com"));
        assert!(agent.history().iter().any(|line| line.starts_with("Work: ")));
    }

    #[tokio::test]
    async fn empty_mailbox_short_circuits_before_the_model() {
        let model = ScriptedLLM::always_ok(GROUPED_REPLY);
        let mut agent = analyzer(StubMailbox::new(Vec::new()), model.clone());

        let result = agent.execute(5).await;

        assert_eq!(result, AnalysisResult::failed(AnalysisFailure::NoEmailsFound));
        assert_eq!(result.error.unwrap().to_string(), "No emails found.");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn quota_exhaustion_becomes_an_error_result() {
        let model = ScriptedLLM::always_err(quota_error());
        let mut agent = analyzer(three_messages(), model.clone());

        let result = agent.execute_with_retries(3, 3).await;

        assert!(result.categories.is_empty());
        assert_eq!(result.error, Some(AnalysisFailure::ModelUnavailable { attempts: 3 }));
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn one_rate_limit_then_success() {
        let model = ScriptedLLM::new(vec![Err(quota_error()), Ok(GROUPED_REPLY.to_string())]);
        let mut agent = analyzer(three_messages(), model.clone());

        let result = agent.execute_with_retries(3, 3).await;

        assert!(result.success());
        assert_eq!(result.categories.len(), 1);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn other_model_errors_are_not_retried() {
        let model = ScriptedLLM::always_err(LLMError::PromptError("invalid api key".to_string()));
        let mut agent = analyzer(three_messages(), model.clone());

        let result = agent.execute(3).await;

        assert!(matches!(result.error, Some(AnalysisFailure::ModelCallFailed(_))));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn unparseable_reply_is_reported() {
        let model = ScriptedLLM::always_ok("I could not find any categories, sorry.");
        let mut agent = analyzer(three_messages(), model);

        let result = agent.execute(3).await;

        assert_eq!(result.error, Some(AnalysisFailure::ResponseUnparseable));
        assert!(result.categories.is_empty());
    }

    #[tokio::test]
    async fn prompt_only_holds_the_batch_size() {
        let model = ScriptedLLM::always_ok(GROUPED_REPLY);
        let mut agent = analyzer(three_messages(), model.clone()).with_prompt_batch_size(2);

        agent.execute(3).await;

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("ID: a2"));
        assert!(!prompt.contains("ID: a3"));
    }

    #[tokio::test]
    async fn repeated_runs_reuse_the_cached_batch() {
        let mailbox = three_messages();
        let model = ScriptedLLM::always_ok(GROUPED_REPLY);
        let mut agent = analyzer(mailbox.clone(), model.clone());

        agent.execute(3).await;
        agent.execute(3).await;

        assert_eq!(mailbox.list_calls(), 1);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn id_validation_drops_unknown_ids() {
        let reply = r#"{"categories": [
            {"name": "Work", "description": "", "email_ids": ["a1", "zz"], "count": 2},
            {"name": "Ghosts", "description": "", "email_ids": ["nope"], "count": 1}
        ]}"#;
        let model = ScriptedLLM::always_ok(reply);
        let mut agent = analyzer(three_messages(), model).with_email_id_validation(true);

        let result = agent.execute(3).await;

        assert_eq!(result.categories.len(), 1);
        assert_eq!(result.categories[0].email_ids, vec!["a1"]);
        assert_eq!(result.categories[0].count, 1);
    }

    #[tokio::test]
    async fn apply_categories_reports_partial_failures() {
        let mailbox = three_messages().failing_apply_for("a2");
        let model = ScriptedLLM::always_ok(GROUPED_REPLY);
        let mut agent = analyzer(mailbox.clone(), model);

        let result = agent.execute(3).await;
        let outcomes = agent.apply_categories(&result).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].folder, "Work");
        assert_eq!(outcomes[0].success, vec!["a1", "a3"]);
        assert_eq!(outcomes[0].failed[0].id, "a2");
        assert_eq!(mailbox.created_labels(), vec!["Work"]);
    }

    #[tokio::test]
    async fn folder_creation_failure_fails_only_that_category() {
        let reply = r#"{"categories": [
            {"name": "Bad/Name", "description": "", "email_ids": ["a1", "a2"], "count": 2},
            {"name": "Events", "description": "", "email_ids": ["a3"], "count": 1}
        ]}"#;
        let mailbox = three_messages().failing_create_for("Bad/Name");
        let mut agent = analyzer(mailbox.clone(), ScriptedLLM::always_ok(reply));

        let result = agent.execute(3).await;
        let outcomes = agent.apply_categories(&result).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].folder, "Bad/Name");
        assert_eq!(outcomes[0].label_id, None);
        assert!(outcomes[0].success.is_empty());
        let failed: Vec<_> = outcomes[0].failed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(failed, vec!["a1", "a2"]);

        assert_eq!(outcomes[1].folder, "Events");
        assert!(outcomes[1].label_id.is_some());
        assert_eq!(outcomes[1].success, vec!["a3"]);
        assert!(outcomes[1].failed.is_empty());
        assert_eq!(mailbox.created_labels(), vec!["Events"]);
    }
}
