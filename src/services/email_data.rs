use crate::mailbox::{
    ApplyOutcome, CreatedLabel, DEFAULT_HEADERS, FailedMessage, LabelInfo, MailboxClient,
    MailboxError,
};
use crate::models::EmailRecord;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Gmail's reserved inbox-tab labels (`CATEGORY_PROMOTIONS`, ...) start with this.
pub const RESERVED_LABEL_PREFIX: &str = "CATEGORY_";

/// Separator line between emails in a prompt.
const PROMPT_SEPARATOR: &str = "\n---\n";

/// Result of moving a set of emails into a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortOutcome {
    pub folder: String,
    pub label_id: Option<String>,
    pub success: Vec<String>,
    pub failed: Vec<FailedMessage>,
}

/// Fetches, caches and formats email records on top of a [`MailboxClient`].
///
/// Batches are cached per requested size for the lifetime of the service and
/// never refreshed on their own; call [`EmailDataService::clear_cache`] or
/// fetch with `use_cache = false` to see new mail.
pub struct EmailDataService {
    mailbox: Box<dyn MailboxClient>,
    /// Batches keyed by requested size, in the order they were first fetched.
    cache: Vec<(usize, Vec<EmailRecord>)>,
    label_names: Option<HashMap<String, String>>,
}

impl EmailDataService {
    pub fn new(mailbox: Box<dyn MailboxClient>) -> Self {
        Self {
            mailbox,
            cache: Vec::new(),
            label_names: None,
        }
    }

    fn cached(&self, max_results: usize) -> Option<&Vec<EmailRecord>> {
        self.cache
            .iter()
            .find(|(size, _)| *size == max_results)
            .map(|(_, emails)| emails)
    }

    fn store(&mut self, max_results: usize, emails: Vec<EmailRecord>) {
        match self.cache.iter_mut().find(|(size, _)| *size == max_results) {
            Some((_, batch)) => *batch = emails,
            None => self.cache.push((max_results, emails)),
        }
    }

    /// Returns up to `max_results` recent emails.
    ///
    /// With `use_cache`, a batch previously fetched for the same size is
    /// returned as-is. Otherwise the mailbox is queried and the fresh batch
    /// replaces the cached one. A message whose metadata cannot be fetched is
    /// skipped with a warning.
    pub async fn fetch_emails(
        &mut self,
        max_results: usize,
        use_cache: bool,
    ) -> Result<Vec<EmailRecord>, MailboxError> {
        if use_cache {
            if let Some(cached) = self.cached(max_results) {
                debug!(max_results, count = cached.len(), "Serving emails from cache");
                return Ok(cached.clone());
            }
        }

        let ids = self.mailbox.list_recent_message_ids(max_results).await?;
        if ids.is_empty() {
            info!(max_results, "Mailbox returned no messages");
            self.store(max_results, Vec::new());
            return Ok(Vec::new());
        }

        let label_names = self.label_names().await;
        let mut emails = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.mailbox.get_message_metadata(id, &DEFAULT_HEADERS).await {
                Ok(meta) => emails.push(EmailRecord::from_metadata(meta, &label_names)),
                Err(e) => warn!(message_id = %id, error = %e, "Skipping message"),
            }
        }

        info!(requested = max_results, fetched = emails.len(), "Fetched emails");
        self.store(max_results, emails.clone());
        Ok(emails)
    }

    /// Label id to display name, fetched once and kept until the cache is cleared.
    ///
    /// When the labels cannot be listed the map is empty, records keep their raw
    /// label ids, and the next fetch asks again.
    async fn label_names(&mut self) -> HashMap<String, String> {
        if let Some(names) = &self.label_names {
            return names.clone();
        }
        match self.mailbox.list_labels().await {
            Ok(labels) => {
                let names: HashMap<String, String> = labels
                    .into_iter()
                    .map(|label| (label.id, label.name))
                    .collect();
                self.label_names = Some(names.clone());
                names
            }
            Err(e) => {
                warn!(error = %e, "Failed to list labels, keeping raw label ids");
                HashMap::new()
            }
        }
    }

    /// Renders the first `max_emails` emails as prompt blocks separated by `---` lines.
    pub fn format_for_prompt(&self, emails: &[EmailRecord], max_emails: usize) -> String {
        emails
            .iter()
            .take(max_emails)
            .map(EmailRecord::to_prompt_block)
            .collect::<Vec<_>>()
            .join(PROMPT_SEPARATOR)
    }

    /// Renders every email in full, separated by blank lines.
    pub fn format_for_log(&self, emails: &[EmailRecord]) -> String {
        emails
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Looks `ids` up across every cached batch; first occurrence wins.
    pub fn get_emails_by_ids(&self, ids: &[String]) -> Vec<EmailRecord> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        self.cache
            .iter()
            .flat_map(|(_, batch)| batch)
            .filter(|email| wanted.contains(email.id.as_str()) && seen.insert(email.id.clone()))
            .cloned()
            .collect()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.label_names = None;
    }

    /// User-visible folders: every label except the reserved `CATEGORY_` ones.
    pub async fn get_folders(&self) -> Result<Vec<LabelInfo>, MailboxError> {
        let labels = self.mailbox.list_labels().await?;
        Ok(labels
            .into_iter()
            .filter(|label| !label.name.starts_with(RESERVED_LABEL_PREFIX))
            .collect())
    }

    pub async fn create_folder(&self, name: &str) -> Result<CreatedLabel, MailboxError> {
        self.mailbox.create_label(name).await
    }

    /// Puts `ids` into the folder `folder_name`, creating the folder if needed.
    pub async fn sort_emails(
        &self,
        ids: &[String],
        folder_name: &str,
    ) -> Result<SortOutcome, MailboxError> {
        let folder = self.create_folder(folder_name).await?;
        if folder.created {
            info!(folder = %folder.name, label_id = %folder.id, "Created folder");
        }
        let ApplyOutcome { success, failed } = self.mailbox.apply_label(ids, &folder.id).await?;
        if !failed.is_empty() {
            warn!(folder = %folder_name, failed = failed.len(), "Some emails could not be sorted");
        }
        Ok(SortOutcome {
            folder: folder_name.to_string(),
            label_id: Some(folder.id),
            success,
            failed,
        })
    }
}
