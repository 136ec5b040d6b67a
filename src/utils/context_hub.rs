// The `context_hub` module provides a centralized hub for Gmail authentication.

use super::google_auth::{AuthError, GConf, GmailHubType, gmail_auth};
use google_gmail1::api::Scope;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info};

/// A hub for managing Gmail authentication.
///
/// Components that need Gmail access register their scopes here; the first
/// call to [`ContextHub::get_hub`] runs the OAuth flow once for all of them
/// and caches the authenticated hub, so the user sees a single consent prompt.
///
/// Wrap it in an `Arc` to share it.
pub struct ContextHub {
    gconf: GConf,
    scopes: Mutex<Vec<Scope>>,
    hub: TokioMutex<Option<GmailHubType>>,
}

impl ContextHub {
    /// Creates a new `ContextHub`.
    pub fn new(gconf: GConf) -> Self {
        Self {
            gconf,
            scopes: Mutex::new(Vec::new()),
            hub: TokioMutex::new(None),
        }
    }

    /// Adds a scope to be requested at authentication time.
    pub fn add_scope(&self, scope: Scope) {
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
        debug!(scopes = ?scopes, "Registered Gmail scopes");
    }

    /// Returns the authenticated hub, authenticating on first use.
    pub async fn get_hub(&self) -> Result<GmailHubType, AuthError> {
        let mut hub_guard = self.hub.lock().await;
        if let Some(hub) = hub_guard.as_ref() {
            return Ok(hub.clone());
        }

        // Copy the scopes out so the std mutex is not held across the await.
        let scopes = self
            .scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let hub = gmail_auth(self.gconf.clone(), &scopes).await?;
        info!(scope_count = scopes.len(), "Gmail hub cached");
        *hub_guard = Some(hub.clone());

        Ok(hub)
    }
}
