// The `mailbox` module defines the narrow interface the pipeline uses to talk
// to an email provider, plus the Gmail implementation of it.

pub mod gmail;

use crate::utils::google_auth::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use gmail::GmailMailbox;

/// Headers requested for every metadata fetch.
pub const DEFAULT_HEADERS: [&str; 3] = ["From", "Subject", "Date"];

/// Whether two label names match ignoring case, in any script.
pub fn same_label_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// The `MailboxError` enum defines the failures a mailbox client can report.
#[derive(Error, Debug)]
pub enum MailboxError {
    /// The client could not authenticate against the provider.
    #[error("Mailbox authentication failed: {0}")]
    Auth(#[from] AuthError),
    /// The provider API returned an error.
    #[error("Mailbox API error: {0}")]
    Api(String),
    /// The provider returned a message without a field we rely on.
    #[error("Invalid message from provider: {0}")]
    InvalidMessage(String),
}

/// A provider label, e.g. `{ id: "Label_12", name: "Receipts" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// Message metadata as returned by the provider, before label ids are resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageMetadata {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    /// Header name to value, as sent by the provider.
    pub headers: HashMap<String, String>,
    pub snippet: String,
}

/// Result of [`MailboxClient::create_label`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedLabel {
    pub id: String,
    pub name: String,
    /// `false` when a label with the same name (ignoring case) already existed.
    pub created: bool,
}

/// A message the provider refused to relabel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedMessage {
    pub id: String,
    pub error: String,
}

/// Per-message result of [`MailboxClient::apply_label`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub success: Vec<String>,
    pub failed: Vec<FailedMessage>,
}

/// The contract the pipeline needs from an email provider.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// Lists every label in the mailbox.
    async fn list_labels(&self) -> Result<Vec<LabelInfo>, MailboxError>;

    /// Lists the ids of the most recent messages, newest first, at most `max`.
    async fn list_recent_message_ids(&self, max: usize) -> Result<Vec<String>, MailboxError>;

    /// Fetches the metadata of one message, restricted to `headers`.
    async fn get_message_metadata(
        &self,
        id: &str,
        headers: &[&str],
    ) -> Result<MessageMetadata, MailboxError>;

    /// Returns the label called `name`, creating it if no label matches ignoring case.
    async fn create_label(&self, name: &str) -> Result<CreatedLabel, MailboxError>;

    /// Adds `label_id` to every message in `ids`, collecting per-message failures.
    async fn apply_label(
        &self,
        ids: &[String],
        label_id: &str,
    ) -> Result<ApplyOutcome, MailboxError>;
}
