// The `prompts` module holds the fixed prompt templates and renders them.
//
// Template wording shifts the model's output, so treat both constants as a
// stable contract. The analysis template must keep its JSON output shape.

use crate::models::EmailRecord;
use crate::utils::{TEngine, TEngineError};
use serde_json::json;

const ANALYZE_TEMPLATE: &str = "analyze_emails";
const CLASSIFY_TEMPLATE: &str = "classify_email";

/// Asks for folder categories over a batch of formatted emails.
pub const ANALYZE_EMAILS_PROMPT: &str = r#"Analyze these emails and suggest folder categories.

Emails:
{{emails}}

Requirements:
- Group similar emails together (by sender, topic, or purpose)
- Suggest clear, descriptive folder names
- Each email should belong to exactly one category

Return JSON with categories:
{
    "categories": [
        {
            "name": "folder_name",
            "description": "brief description of why these emails belong together",
            "email_ids": ["id1", "id2"],
            "count": 5
        }
    ]
}
"#;

/// Asks for one fixed category for a single email.
pub const CLASSIFY_EMAIL_PROMPT: &str = r#"You are an email classification assistant.

Classify the following email into one of the categories:
- PERSONAL
- WORK
- NEWSLETTER
- PROMOTION
- SOCIAL
- FINANCE
- OTHER

Return only the category name, nothing else.

From: {{sender}}
Subject: {{subject}}
Snippet: {{snippet}}
Existing Gmail labels: {{labels}}"#;

/// Renders the analysis and classification prompts.
pub struct PromptBuilder {
    engine: TEngine,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, TEngineError> {
        let mut engine = TEngine::new();
        engine.register_template_string(ANALYZE_TEMPLATE, ANALYZE_EMAILS_PROMPT)?;
        engine.register_template_string(CLASSIFY_TEMPLATE, CLASSIFY_EMAIL_PROMPT)?;
        Ok(Self { engine })
    }

    /// Substitutes already formatted email text into the analysis template.
    pub fn analysis_prompt(&self, emails_text: &str) -> Result<String, TEngineError> {
        self.engine
            .render(ANALYZE_TEMPLATE, &json!({ "emails": emails_text }))
    }

    pub fn classification_prompt(&self, email: &EmailRecord) -> Result<String, TEngineError> {
        self.engine.render(
            CLASSIFY_TEMPLATE,
            &json!({
                "sender": email.sender,
                "subject": email.subject,
                "snippet": email.snippet,
                "labels": email.labels.join(", "),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_embeds_emails_and_output_shape() {
        let builder = PromptBuilder::new().unwrap();
        let emails = "ID: 1\nFrom: a@b.c\n---\nID: 2\nFrom: {curly} <d@e.f>";

        let prompt = builder.analysis_prompt(emails).unwrap();

        assert!(prompt.contains(emails));
        assert!(prompt.contains(r#""categories": ["#));
        for field in [r#""name""#, r#""description""#, r#""email_ids""#, r#""count""#] {
            assert!(prompt.contains(field), "missing {field}");
        }
    }

    #[test]
    fn analysis_prompt_is_deterministic() {
        let builder = PromptBuilder::new().unwrap();
        assert_eq!(
            builder.analysis_prompt("x").unwrap(),
            builder.analysis_prompt("x").unwrap()
        );
    }

    #[test]
    fn classification_prompt_lists_labels() {
        let builder = PromptBuilder::new().unwrap();
        let email = EmailRecord {
            id: "1".to_string(),
            thread_id: "t".to_string(),
            subject: "Your order shipped".to_string(),
            sender: "Shop <shop@example.com>".to_string(),
            snippet: "Tracking number inside".to_string(),
            labels: vec!["INBOX".to_string(), "CATEGORY_UPDATES".to_string()],
            date: String::new(),
        };

        let prompt = builder.classification_prompt(&email).unwrap();

        assert!(prompt.contains("From: Shop <shop@example.com>"));
        assert!(prompt.contains("Existing Gmail labels: INBOX, CATEGORY_UPDATES"));
    }
}
