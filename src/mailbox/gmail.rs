// The `gmail` module implements `MailboxClient` over the Gmail REST API.

use crate::mailbox::{
    ApplyOutcome, CreatedLabel, FailedMessage, LabelInfo, MailboxClient, MailboxError,
    MessageMetadata, same_label_name,
};
use crate::utils::context_hub::ContextHub;
use crate::utils::google_auth::GmailHubType;
use async_trait::async_trait;
use google_gmail1::api::{Label, Message, ModifyMessageRequest, Scope};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const USER_ID: &str = "me";

/// Gmail-backed mailbox. Authentication is shared through a [`ContextHub`].
pub struct GmailMailbox {
    hub: Arc<ContextHub>,
}

impl GmailMailbox {
    /// Creates a new `GmailMailbox`, registering the scopes it needs with `hub`.
    pub fn new(hub: Arc<ContextHub>) -> Self {
        hub.add_scope(Scope::Modify);
        hub.add_scope(Scope::Label);
        Self { hub }
    }

    async fn gmail(&self) -> Result<GmailHubType, MailboxError> {
        Ok(self.hub.get_hub().await?)
    }
}

fn api_error(e: google_gmail1::Error) -> MailboxError {
    MailboxError::Api(e.to_string())
}

/// Checks the fields the pipeline relies on and flattens the header list.
fn into_metadata(message: Message) -> Result<MessageMetadata, MailboxError> {
    let id = message
        .id
        .ok_or_else(|| MailboxError::InvalidMessage("message without id".to_string()))?;

    let headers: HashMap<String, String> = message
        .payload
        .and_then(|payload| payload.headers)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|header| Some((header.name?, header.value?)))
        .collect();

    Ok(MessageMetadata {
        id,
        thread_id: message.thread_id.unwrap_or_default(),
        label_ids: message.label_ids.unwrap_or_default(),
        headers,
        snippet: message.snippet.unwrap_or_default(),
    })
}

#[async_trait]
impl MailboxClient for GmailMailbox {
    async fn list_labels(&self) -> Result<Vec<LabelInfo>, MailboxError> {
        let (_, response) = self
            .gmail()
            .await?
            .users()
            .labels_list(USER_ID)
            .add_scope(Scope::Label)
            .doit()
            .await
            .map_err(api_error)?;

        let labels: Vec<LabelInfo> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match (label.id, label.name) {
                (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                _ => None,
            })
            .collect();
        debug!(count = labels.len(), "Listed labels");
        Ok(labels)
    }

    async fn list_recent_message_ids(&self, max: usize) -> Result<Vec<String>, MailboxError> {
        let max_results = u32::try_from(max).unwrap_or(u32::MAX);
        let (_, response) = self
            .gmail()
            .await?
            .users()
            .messages_list(USER_ID)
            .max_results(max_results)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .map_err(api_error)?;

        Ok(response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| message.id)
            .collect())
    }

    async fn get_message_metadata(
        &self,
        id: &str,
        headers: &[&str],
    ) -> Result<MessageMetadata, MailboxError> {
        let gmail = self.gmail().await?;
        let mut call = gmail.users().messages_get(USER_ID, id).format("metadata");
        for header in headers {
            call = call.add_metadata_headers(*header);
        }
        let (_, message) = call
            .add_scope(Scope::Modify)
            .doit()
            .await
            .map_err(api_error)?;

        into_metadata(message)
    }

    async fn create_label(&self, name: &str) -> Result<CreatedLabel, MailboxError> {
        if let Some(existing) = self
            .list_labels()
            .await?
            .into_iter()
            .find(|label| same_label_name(&label.name, name))
        {
            debug!(label = %existing.name, "Label already exists");
            return Ok(CreatedLabel {
                id: existing.id,
                name: existing.name,
                created: false,
            });
        }

        let label = Label {
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };
        let (_, created) = self
            .gmail()
            .await?
            .users()
            .labels_create(label, USER_ID)
            .add_scope(Scope::Label)
            .doit()
            .await
            .map_err(api_error)?;

        let id = created
            .id
            .ok_or_else(|| MailboxError::Api(format!("created label '{name}' has no id")))?;
        info!(label = %name, label_id = %id, "Created label");
        Ok(CreatedLabel {
            id,
            name: created.name.unwrap_or_else(|| name.to_string()),
            created: true,
        })
    }

    async fn apply_label(
        &self,
        ids: &[String],
        label_id: &str,
    ) -> Result<ApplyOutcome, MailboxError> {
        let gmail = self.gmail().await?;
        let mut outcome = ApplyOutcome::default();

        for id in ids {
            let request = ModifyMessageRequest {
                add_label_ids: Some(vec![label_id.to_string()]),
                remove_label_ids: None,
            };
            match gmail
                .users()
                .messages_modify(request, USER_ID, id)
                .add_scope(Scope::Modify)
                .doit()
                .await
            {
                Ok(_) => outcome.success.push(id.clone()),
                Err(e) => {
                    warn!(message_id = %id, label_id, error = %e, "Failed to apply label");
                    outcome.failed.push(FailedMessage {
                        id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }
}
