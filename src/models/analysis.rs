use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// One folder the model suggests, with the emails it would hold.
///
/// Taken verbatim from the model reply: `email_ids` may name messages that
/// were never fetched and `count` may disagree with `email_ids.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryProposal {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub email_ids: Vec<String>,
    #[serde(default)]
    pub count: i64,
}

/// Why an analysis produced no categories.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisFailure {
    #[error("No emails found.")]
    NoEmailsFound,
    #[error("Failed to fetch emails: {0}")]
    MailboxUnavailable(String),
    /// Every attempt hit the model quota.
    #[error("Failed to get model response.")]
    ModelUnavailable { attempts: usize },
    #[error("Model call failed: {0}")]
    ModelCallFailed(String),
    #[error("unparseable response")]
    ResponseUnparseable,
    #[error("Failed to render prompt: {0}")]
    PromptRendering(String),
}

impl Serialize for AnalysisFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Terminal output of one analysis run. `error` set implies no categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub categories: Vec<CategoryProposal>,
    pub error: Option<AnalysisFailure>,
}

impl AnalysisResult {
    pub fn with_categories(categories: Vec<CategoryProposal>) -> Self {
        Self {
            categories,
            error: None,
        }
    }

    pub fn failed(error: AnalysisFailure) -> Self {
        Self {
            categories: Vec::new(),
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}
