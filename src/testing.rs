// Shared test doubles for the mailbox and model boundaries.

use crate::llm::{LLM, LLMError};
use crate::mailbox::{
    ApplyOutcome, CreatedLabel, FailedMessage, LabelInfo, MailboxClient, MailboxError,
    MessageMetadata, same_label_name,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn stub_message(
    id: &str,
    subject: &str,
    sender: &str,
    snippet: &str,
    label_ids: &[&str],
) -> MessageMetadata {
    MessageMetadata {
        id: id.to_string(),
        thread_id: format!("thread-{id}"),
        label_ids: label_ids.iter().map(|l| l.to_string()).collect(),
        headers: HashMap::from([
            ("From".to_string(), sender.to_string()),
            ("Subject".to_string(), subject.to_string()),
            ("Date".to_string(), "Mon, 6 Oct 2025 09:00:00 +0000".to_string()),
        ]),
        snippet: snippet.to_string(),
    }
}

/// In-memory mailbox. Clones share their counters and label store.
#[derive(Clone, Default)]
pub struct StubMailbox {
    messages: Vec<MessageMetadata>,
    labels: Arc<Mutex<Vec<LabelInfo>>>,
    created: Arc<Mutex<Vec<String>>>,
    failing_metadata: Vec<String>,
    failing_apply: Vec<String>,
    failing_create: Vec<String>,
    failing_labels: bool,
    list_calls: Arc<AtomicUsize>,
    label_list_calls: Arc<AtomicUsize>,
}

impl StubMailbox {
    pub fn new(messages: Vec<MessageMetadata>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_labels(self, labels: &[(&str, &str)]) -> Self {
        *self.labels.lock().unwrap() = labels
            .iter()
            .map(|(id, name)| LabelInfo {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect();
        self
    }

    pub fn failing_metadata_for(mut self, id: &str) -> Self {
        self.failing_metadata.push(id.to_string());
        self
    }

    pub fn failing_apply_for(mut self, id: &str) -> Self {
        self.failing_apply.push(id.to_string());
        self
    }

    pub fn failing_create_for(mut self, name: &str) -> Self {
        self.failing_create.push(name.to_string());
        self
    }

    pub fn failing_label_list(mut self) -> Self {
        self.failing_labels = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn label_list_calls(&self) -> usize {
        self.label_list_calls.load(Ordering::SeqCst)
    }

    pub fn created_labels(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailboxClient for StubMailbox {
    async fn list_labels(&self) -> Result<Vec<LabelInfo>, MailboxError> {
        self.label_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_labels {
            return Err(MailboxError::Api("503 Service Unavailable".to_string()));
        }
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn list_recent_message_ids(&self, max: usize) -> Result<Vec<String>, MailboxError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.messages.iter().take(max).map(|m| m.id.clone()).collect())
    }

    async fn get_message_metadata(
        &self,
        id: &str,
        _headers: &[&str],
    ) -> Result<MessageMetadata, MailboxError> {
        if self.failing_metadata.iter().any(|f| f == id) {
            return Err(MailboxError::Api(format!("404 for {id}")));
        }
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| MailboxError::InvalidMessage(id.to_string()))
    }

    async fn create_label(&self, name: &str) -> Result<CreatedLabel, MailboxError> {
        if self.failing_create.iter().any(|f| f == name) {
            return Err(MailboxError::Api(format!("Invalid label name: {name}")));
        }
        let mut labels = self.labels.lock().unwrap();
        if let Some(existing) = labels.iter().find(|l| same_label_name(&l.name, name)) {
            return Ok(CreatedLabel {
                id: existing.id.clone(),
                name: existing.name.clone(),
                created: false,
            });
        }
        let label = LabelInfo {
            id: format!("Label_new_{}", labels.len()),
            name: name.to_string(),
        };
        labels.push(label.clone());
        self.created.lock().unwrap().push(name.to_string());
        Ok(CreatedLabel {
            id: label.id,
            name: label.name,
            created: true,
        })
    }

    async fn apply_label(
        &self,
        ids: &[String],
        _label_id: &str,
    ) -> Result<ApplyOutcome, MailboxError> {
        let mut outcome = ApplyOutcome::default();
        for id in ids {
            if self.failing_apply.contains(id) {
                outcome.failed.push(FailedMessage {
                    id: id.clone(),
                    error: "Requested entity was not found.".to_string(),
                });
            } else {
                outcome.success.push(id.clone());
            }
        }
        Ok(outcome)
    }
}

/// Model double that replays a script of replies, then repeats the last one.
#[derive(Clone)]
pub struct ScriptedLLM {
    script: Arc<Mutex<VecDeque<Result<String, LLMError>>>>,
    last: Arc<Mutex<Option<Result<String, LLMError>>>>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLLM {
    pub fn new(script: Vec<Result<String, LLMError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            last: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always_ok(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn always_err(error: LLMError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn prompt(&self, text: String) -> Result<String, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(text);
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .unwrap_or_else(|| Err(LLMError::PromptError("empty script".to_string())))
    }
}
