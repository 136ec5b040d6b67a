use crate::mailbox::MessageMetadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of snippet characters shown in prompts and logs.
pub const PREVIEW_CHARS: usize = 100;

/// One message, normalized from a provider response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub date: String,
}

impl EmailRecord {
    /// Builds a record from provider metadata, resolving label ids through
    /// `label_names`. Ids without a known name are kept verbatim.
    pub fn from_metadata(meta: MessageMetadata, label_names: &HashMap<String, String>) -> Self {
        let header = |name: &str| {
            meta.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        };
        let subject = header("Subject");
        let sender = header("From");
        let date = header("Date");

        let labels = meta
            .label_ids
            .iter()
            .map(|id| label_names.get(id).cloned().unwrap_or_else(|| id.clone()))
            .collect();

        Self {
            id: meta.id,
            thread_id: meta.thread_id,
            subject,
            sender,
            snippet: meta.snippet,
            labels,
            date,
        }
    }

    /// The first [`PREVIEW_CHARS`] characters of the snippet.
    pub fn preview(&self) -> &str {
        match self.snippet.char_indices().nth(PREVIEW_CHARS) {
            Some((cut, _)) => &self.snippet[..cut],
            None => &self.snippet,
        }
    }

    /// The block this email contributes to an analysis prompt.
    pub fn to_prompt_block(&self) -> String {
        format!(
            "ID: {}\nFrom: {}\nSubject: {}\nLabels: {}\nPreview: {}",
            self.id,
            self.sender,
            self.subject,
            self.labels.join(", "),
            self.preview()
        )
    }
}

impl fmt::Display for EmailRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "id: {}", self.id)?;
        writeln!(f, "thread_id: {}", self.thread_id)?;
        writeln!(f, "subject: {}", self.subject)?;
        writeln!(f, "from: {}", self.sender)?;
        writeln!(f, "snippet: {}...", self.preview())?;
        writeln!(f, "labels: {:?}", self.labels)?;
        write!(f, "date: {}", self.date)
    }
}
