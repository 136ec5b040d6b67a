// This demo fetches the most recent emails, asks Gemini to group them into folder
// categories, prints the proposal and, when APPLY_LABELS is set, files the emails.

use mailsort::{ContextHub, EmailAnalyzer, GmailMailbox, Settings, prompts::PromptBuilder};
use rig::{client::CompletionClient, providers::gemini::Client};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize the logger.
    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    if let Err(e) = settings.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    let Some(api_key) = settings.gemini_api_key.as_deref() else {
        return ExitCode::FAILURE;
    };

    let hub = Arc::new(ContextHub::new(settings.gconf()));
    let mailbox = GmailMailbox::new(hub);

    let gemini_agent = Client::new(api_key).agent(&settings.gemini_model).build();

    let prompts = match PromptBuilder::new() {
        Ok(prompts) => prompts,
        Err(e) => {
            error!(error = %e, "Failed to load prompt templates");
            return ExitCode::FAILURE;
        }
    };

    let mut analyzer = EmailAnalyzer::new(Box::new(mailbox), Box::new(gemini_agent), prompts)
        .with_settings(&settings);
    info!(count = settings.fetch_count, model = %settings.gemini_model, "Analyzing recent emails");

    let result = analyzer.execute(settings.fetch_count).await;
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "Failed to serialize analysis result"),
    }

    if let Some(failure) = &result.error {
        error!(error = %failure, "Analysis failed");
        return ExitCode::FAILURE;
    }

    if settings.apply_labels {
        for outcome in analyzer.apply_categories(&result).await {
            info!(
                folder = %outcome.folder,
                moved = outcome.success.len(),
                failed = outcome.failed.len(),
                "Applied folder"
            );
            for failed in &outcome.failed {
                warn!(message_id = %failed.id, error = %failed.error, "Email not moved");
            }
        }
    } else {
        info!("APPLY_LABELS not set, leaving the mailbox untouched");
    }

    ExitCode::SUCCESS
}
