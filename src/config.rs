//! Application settings.
//!
//! Settings are read once at startup, from the process environment primed by
//! an optional `.env` file, and handed to the components that need them.

use crate::llm::{RetryConfig, RetryStrategy};
use crate::utils::google_auth::GConf;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("Failed to read env file {path}: {message}")]
    EnvFile { path: PathBuf, message: String },
    #[error("Configuration errors:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    /// How many recent emails to fetch per analysis.
    pub fetch_count: usize,
    /// How many of the fetched emails go into the prompt.
    pub prompt_batch_size: usize,
    pub retry: RetryConfig,
    /// Drop category ids that do not belong to the fetched batch.
    pub validate_email_ids: bool,
    pub apply_labels: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            credentials_path: PathBuf::from("config/credentials.json"),
            token_path: PathBuf::from("config/token.json"),
            fetch_count: 50,
            prompt_batch_size: 10,
            retry: RetryConfig::default(),
            validate_email_ids: false,
            apply_labels: false,
            log_level: "info".to_string(),
        }
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        message: e.to_string(),
    })
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key,
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

impl Settings {
    /// Loads `.env` (if present) into the environment, then reads the settings from it.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings from a `.env` file only, leaving the environment untouched.
    // dotenv's only non-mutating reader is the deprecated iterator API.
    #[allow(deprecated)]
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let env_error = |e: dotenv::Error| ConfigError::EnvFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let mut values = HashMap::new();
        for item in dotenv::from_path_iter(path).map_err(env_error)? {
            let (key, value) = item.map_err(env_error)?;
            values.insert(key, value);
        }
        Self::from_lookup(|key| values.get(key).cloned())
    }

    /// Builds settings from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        settings.gemini_api_key = lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty());
        if let Some(model) = lookup("GEMINI_MODEL") {
            settings.gemini_model = model;
        }
        if let Some(path) = lookup("GMAIL_CREDENTIALS_FILE") {
            settings.credentials_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("GMAIL_TOKEN_FILE") {
            settings.token_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("MAIL_FETCH_COUNT") {
            settings.fetch_count = parse("MAIL_FETCH_COUNT", &raw)?;
        }
        if let Some(raw) = lookup("PROMPT_BATCH_SIZE") {
            settings.prompt_batch_size = parse("PROMPT_BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("MODEL_MAX_RETRIES") {
            settings.retry.max_attempts = parse("MODEL_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("MODEL_RETRY_WAIT") {
            settings.retry.base_delay =
                humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidValue {
                    key: "MODEL_RETRY_WAIT",
                    message: e.to_string(),
                })?;
        }
        if let Some(raw) = lookup("MODEL_RETRY_STRATEGY") {
            settings.retry.strategy = parse::<RetryStrategy>("MODEL_RETRY_STRATEGY", &raw)?;
        }
        if let Some(raw) = lookup("MODEL_HONOR_RETRY_HINT") {
            settings.retry.honor_retry_hint = parse_flag("MODEL_HONOR_RETRY_HINT", &raw)?;
        }
        if let Some(raw) = lookup("VALIDATE_EMAIL_IDS") {
            settings.validate_email_ids = parse_flag("VALIDATE_EMAIL_IDS", &raw)?;
        }
        if let Some(raw) = lookup("APPLY_LABELS") {
            settings.apply_labels = parse_flag("APPLY_LABELS", &raw)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            settings.log_level = level.to_lowercase();
        }

        Ok(settings)
    }

    /// Checks the settings a real run cannot do without, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.gemini_api_key.is_none() {
            errors.push("GEMINI_API_KEY not found in environment or .env".to_string());
        }
        if !self.credentials_path.exists() {
            errors.push(format!(
                "Gmail credentials not found at {}",
                self.credentials_path.display()
            ));
        }
        if self.fetch_count == 0 {
            errors.push("MAIL_FETCH_COUNT must be at least 1".to_string());
        }
        if self.prompt_batch_size == 0 {
            errors.push("PROMPT_BATCH_SIZE must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Google OAuth configuration derived from these settings.
    pub fn gconf(&self) -> GConf {
        GConf::new(self.credentials_path.clone(), self.token_path.clone())
    }
}
