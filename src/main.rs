mod api;
mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
mod workflow;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::cmd::list::{self, ListCommandArgs};
use crate::cmd::serve::{self, ServeCommandArgs};
use crate::cmd::submit::{self, SubmitCommandArgs};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::AppResult;
use crate::infra::firestore::{FirestoreSettings, FirestoreTicketStore};
use crate::infra::huggingface::{HuggingFaceClient, HuggingFaceSettings};
use crate::infra::memory::InMemoryTicketStore;
use crate::services::{InferenceService, TicketStore};

#[derive(Parser)]
#[command(
    name = "intelliroute",
    author,
    version,
    about = "Customer feedback triage: summarize, tag and store feedback tickets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Classify one piece of feedback and store it as a ticket.
    Submit(SubmitArgs),
    /// List stored tickets, most urgent first.
    List(ListArgs),
    /// Manage stored configuration.
    Config(ConfigArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on; overrides the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[derive(Args)]
struct SubmitArgs {
    /// Feedback text.
    text: String,
}

#[derive(Args)]
struct ListArgs {
    /// Only show tickets tagged Urgent.
    #[arg(short, long)]
    urgent_only: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(args) => config_cmd::run(args.command),
        Commands::Serve(args) => {
            let config = AppConfig::load()?;
            let bind_address = args.bind.unwrap_or_else(|| config.bind_address.clone());
            let context = build_context(config)?;
            serve::run(context, ServeCommandArgs { bind_address }).await
        }
        Commands::Submit(args) => {
            let context = build_context(AppConfig::load()?)?;
            let ticket = submit::run(&context, SubmitCommandArgs { text: args.text }).await?;
            println!(
                "Ticket {} created: [{}] {}",
                ticket.id,
                ticket.tag.as_str(),
                ticket.summary
            );
            Ok(())
        }
        Commands::List(args) => {
            let context = build_context(AppConfig::load()?)?;
            let tickets = list::run(
                &context,
                ListCommandArgs {
                    urgent_only: args.urgent_only,
                },
            )
            .await?;
            if tickets.is_empty() {
                println!("No tickets.");
            }
            for ticket in &tickets {
                println!("{}", list::format_row(ticket));
            }
            Ok(())
        }
    }
}

fn build_context(config: AppConfig) -> AppResult<AppContext> {
    if config.hf_api_token.is_none() {
        warn!("HF_API_TOKEN not configured; feedback classification will fail.");
    }

    let inference: Arc<dyn InferenceService> =
        Arc::new(HuggingFaceClient::new(HuggingFaceSettings {
            api_token: config.hf_api_token.clone(),
            base_url: config.hf_base_url.clone(),
            summarization_model: config.summarization_model.clone(),
            zero_shot_model: config.zero_shot_model.clone(),
            sentiment_model: config.sentiment_model.clone(),
            request_timeout: config.request_timeout,
        })?);

    let ticket_store: Arc<dyn TicketStore> = match &config.firestore {
        Some(firestore) => Arc::new(FirestoreTicketStore::new(FirestoreSettings {
            project_id: firestore.resolve_project_id()?,
            access_token: firestore.access_token.clone(),
            emulator_host: firestore.emulator_host.clone(),
            collection_path: firestore.collection_path.clone(),
            request_timeout: config.request_timeout,
        })?),
        None => {
            warn!(
                "Firestore not configured; tickets are kept in memory and lost on exit."
            );
            Arc::new(InMemoryTicketStore::new())
        }
    };

    info!(
        labels = ?config.labels.labels(),
        max_attempts = config.retry.max_attempts,
        sentiment = config.sentiment_enabled,
        store = ticket_store.backend_name(),
        "intelliroute configured"
    );

    Ok(AppContext::new(config, inference, ticket_store))
}
