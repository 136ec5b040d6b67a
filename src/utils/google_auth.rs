// The `google_auth` module authenticates against the Gmail API with the
// installed-application OAuth flow.

use google_gmail1::{
    Gmail,
    api::Scope,
    yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod},
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::Client, client::legacy::connect::HttpConnector, rt::TokioExecutor,
};
use rustls::crypto::{CryptoProvider, ring::default_provider};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// A type alias for the HTTPS connector.
pub type HttpsConnectorType = HttpsConnector<HttpConnector>;
/// A type alias for the Gmail hub.
pub type GmailHubType = Gmail<HttpsConnectorType>;

/// The `AuthError` enum defines the possible errors that can occur during authentication.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The OAuth client secret file could not be read.
    #[error("Failed to read OAuth client secret {path}: {source}")]
    Secret {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The authenticator could not be built (token store unusable).
    #[error("Failed to build the authenticator: {0}")]
    Authenticator(std::io::Error),
    /// The OAuth flow did not yield a token.
    #[error("Failed to obtain an access token: {0}")]
    Token(String),
    /// The TLS connector could not load the native root certificates.
    #[error("Failed to set up TLS: {0}")]
    Tls(std::io::Error),
}

/// The `GConf` struct holds the configuration for Google authentication.
#[derive(Clone, Debug)]
pub struct GConf(Arc<InnerConf>);

/// The inner configuration for `GConf`.
#[derive(Clone, Debug)]
pub struct InnerConf {
    /// The path to the OAuth client `credentials.json` file.
    pub credentials_path: PathBuf,
    /// The path where the access/refresh token is persisted.
    pub token_path: PathBuf,
}

impl GConf {
    /// Creates a new `GConf`.
    pub fn new(credentials_path: PathBuf, token_path: PathBuf) -> GConf {
        GConf(Arc::new(InnerConf {
            credentials_path,
            token_path,
        }))
    }

    /// The OAuth client secret location.
    pub fn credentials_path(&self) -> &PathBuf {
        &self.0.credentials_path
    }

    /// The persisted token location.
    pub fn token_path(&self) -> &PathBuf {
        &self.0.token_path
    }
}

/// Authenticates with the Gmail API and returns a `GmailHubType`.
///
/// A persisted token is reused and refreshed; otherwise the browser-based
/// installed flow runs once and its result is written to the token path.
pub async fn gmail_auth(conf: GConf, scopes: &[Scope]) -> Result<GmailHubType, AuthError> {
    info!(scopes = ?scopes, "Authenticating with Gmail API");

    let secret = google_gmail1::yup_oauth2::read_application_secret(conf.credentials_path())
        .await
        .map_err(|source| AuthError::Secret {
            path: conf.credentials_path().clone(),
            source,
        })?;

    let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
        .persist_tokens_to_disk(conf.token_path())
        .build()
        .await
        .map_err(AuthError::Authenticator)?;

    // Request a token up front so a broken flow fails here, not on the first API call.
    auth.token(scopes)
        .await
        .map_err(|e| AuthError::Token(e.to_string()))?;

    let client = Client::builder(TokioExecutor::new()).build(https_connector()?);

    let hub = Gmail::new(client, auth);
    info!("Successfully authenticated with Gmail API");
    Ok(hub)
}

/// TLS connector trusting the platform's native root certificates.
fn https_connector() -> Result<HttpsConnectorType, AuthError> {
    _ = CryptoProvider::install_default(default_provider());

    Ok(HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(AuthError::Tls)?
        .https_or_http()
        .enable_http1()
        .build())
}
