use std::io::{self, Write};

use clap::{Args, Subcommand};

use crate::config::{StoredConfig, config_file_path};
use crate::error::AppResult;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Run the interactive configuration wizard.
    Init,
    /// Show the stored configuration (secrets masked).
    Show,
}

pub fn run(command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Init => run_init(),
        ConfigCommand::Show => run_show(),
    }
}

fn run_init() -> AppResult<()> {
    let mut cfg = StoredConfig::load()?;

    println!("Configuring intelliroute.");
    println!("Press Enter to keep the current value, '-' to clear it.");
    println!("Secrets are stored in the local config file; protect your filesystem accordingly.");
    println!("Environment variables override anything stored here.");
    println!();

    apply_prompt("Hugging Face API token", &mut cfg.hf_api_token, true)?;
    apply_prompt(
        "Inference base URL (e.g., https://router.huggingface.co/hf-inference)",
        &mut cfg.hf_base_url,
        false,
    )?;
    apply_prompt("Summarization model", &mut cfg.summarization_model, false)?;
    apply_prompt("Zero-shot classification model", &mut cfg.zero_shot_model, false)?;
    apply_prompt("Sentiment model", &mut cfg.sentiment_model, false)?;
    apply_prompt("Sentiment analysis enabled (true/false)", &mut cfg.sentiment_enabled, false)?;
    apply_prompt(
        "Routing labels, comma separated (e.g., Urgent, Billing, Bug Report)",
        &mut cfg.labels,
        false,
    )?;
    apply_prompt("Attempts per inference call", &mut cfg.max_attempts, false)?;

    apply_prompt(
        "Firestore service credential file",
        &mut cfg.firestore_credentials,
        false,
    )?;
    apply_prompt("Firestore project id", &mut cfg.firestore_project_id, false)?;
    apply_prompt("Firestore access token", &mut cfg.firestore_access_token, true)?;
    apply_prompt("Firestore collection path", &mut cfg.firestore_collection, false)?;
    apply_prompt("HTTP bind address", &mut cfg.bind_address, false)?;

    cfg.save()?;

    let path = config_file_path()?;
    println!("\nConfiguration saved to {}", path.display());
    Ok(())
}

fn run_show() -> AppResult<()> {
    let cfg = StoredConfig::load()?;
    let path = config_file_path()?;

    println!("Configuration file: {}", path.display());
    println!("Hugging Face API token: {}", mask_secret(&cfg.hf_api_token));
    println!("Inference base URL: {}", display_value(&cfg.hf_base_url));
    println!(
        "Summarization model: {}",
        display_value(&cfg.summarization_model)
    );
    println!("Zero-shot model: {}", display_value(&cfg.zero_shot_model));
    println!("Sentiment model: {}", display_value(&cfg.sentiment_model));
    println!(
        "Sentiment enabled: {}",
        display_value(&cfg.sentiment_enabled)
    );
    println!("Routing labels: {}", display_value(&cfg.labels));
    println!("Attempts per call: {}", display_value(&cfg.max_attempts));
    println!(
        "Firestore credentials: {}",
        display_value(&cfg.firestore_credentials)
    );
    println!(
        "Firestore project id: {}",
        display_value(&cfg.firestore_project_id)
    );
    println!(
        "Firestore access token: {}",
        mask_secret(&cfg.firestore_access_token)
    );
    println!(
        "Firestore collection: {}",
        display_value(&cfg.firestore_collection)
    );
    println!("Bind address: {}", display_value(&cfg.bind_address));

    Ok(())
}

fn apply_prompt(field: &str, target: &mut Option<String>, secret: bool) -> AppResult<()> {
    match prompt(field, target.as_deref(), secret)? {
        PromptAction::Keep => {}
        PromptAction::Clear => *target = None,
        PromptAction::Set(value) => *target = Some(value),
    }
    Ok(())
}

fn prompt(field: &str, current: Option<&str>, secret: bool) -> AppResult<PromptAction> {
    let mut stdout = io::stdout();

    match (current, secret) {
        (Some(_), true) => write!(stdout, "{field} [****] (Enter to keep, '-' to clear): ")?,
        (Some(value), false) => {
            write!(stdout, "{field} [{value}] (Enter to keep, '-' to clear): ")?
        }
        (None, _) => write!(stdout, "{field} (Enter to skip): ")?,
    }
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();

    if trimmed.is_empty() {
        Ok(PromptAction::Keep)
    } else if trimmed == "-" {
        Ok(PromptAction::Clear)
    } else {
        Ok(PromptAction::Set(trimmed.to_string()))
    }
}

fn display_value(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<not set>".to_string())
}

fn mask_secret(value: &Option<String>) -> String {
    match value {
        Some(token) if token.chars().count() > 6 => {
            let prefix = token.chars().take(3).collect::<String>();
            let suffix = token.chars().skip(token.chars().count() - 3).collect::<String>();
            format!("{prefix}***{suffix}")
        }
        Some(token) if !token.is_empty() => "***".to_string(),
        _ => "<not set>".to_string(),
    }
}

enum PromptAction {
    Keep,
    Clear,
    Set(String),
}
