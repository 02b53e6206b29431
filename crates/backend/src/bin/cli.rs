use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use support_triage::{
    ai::{Classifier, ResponseGenerator},
    build_model, build_pipeline,
    config::AppConfig,
    db,
    repository::{EmailStore, MemoryStore, PgStore},
};

#[derive(Parser)]
#[command(name = "triage-cli")]
#[command(about = "Run the support triage pipeline from the command line")]
#[command(
    long_about = "A command-line interface to the support triage pipeline.\n\n\
    Runs one ingestion pass against the configured mail source, or classifies\n\
    and drafts replies for a single message without touching storage.\n\
    Configuration comes from the same environment variables as the server."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, classify and store new support mail once
    ///
    /// Prints the ingestion report as JSON.
    Ingest {
        /// Keep results in memory instead of writing to DATABASE_URL.
        /// Every message looks new on each dry run.
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify a single message and print the result as JSON
    Classify {
        #[command(flatten)]
        message: MessageArgs,
    },

    /// Classify a single message, then draft a reply for it
    Draft {
        #[command(flatten)]
        message: MessageArgs,

        /// Extra reference text handed to the model while drafting.
        #[arg(short, long, value_name = "TEXT")]
        knowledge_base: Option<String>,
    },
}

#[derive(clap::Args)]
struct MessageArgs {
    /// Subject line of the message.
    #[arg(short, long, default_value = "")]
    subject: String,

    /// Plain-text body of the message.
    #[arg(short, long)]
    body: String,

    /// Sender address.
    #[arg(long, default_value = "")]
    sender: String,
}

#[derive(Serialize)]
struct DraftOutput<'a> {
    classification: &'a shared_types::ClassificationResult,
    reply: &'a shared_types::ResponseGeneration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays parseable JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("support_triage=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::Ingest { dry_run } => handle_ingest(&config, dry_run).await?,
        Commands::Classify { message } => {
            let classifier = Classifier::new(build_model(&config)?);
            let result = classifier
                .classify(&message.subject, &message.body, &message.sender)
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Draft {
            message,
            knowledge_base,
        } => {
            let model = build_model(&config)?;
            let classification = Classifier::new(model.clone())
                .classify(&message.subject, &message.body, &message.sender)
                .await;
            let reply = ResponseGenerator::new(model)
                .generate_with_knowledge(
                    &message.subject,
                    &message.body,
                    &message.sender,
                    &classification,
                    knowledge_base.as_deref(),
                )
                .await;
            let output = DraftOutput {
                classification: &classification,
                reply: &reply,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

async fn handle_ingest(config: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let store: Arc<dyn EmailStore> = if dry_run {
        Arc::new(MemoryStore::new())
    } else {
        let database_url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set (or pass --dry-run)")?;
        Arc::new(PgStore::new(db::establish_connection_pool(database_url)?))
    };

    let pipeline = build_pipeline(config, store)?;
    let report = pipeline.run_ingestion().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dry_run_ingest() {
        let cli = Cli::try_parse_from(["triage-cli", "ingest", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Commands::Ingest { dry_run: true }));
    }

    #[test]
    fn test_parse_classify_args() {
        let cli = Cli::try_parse_from([
            "triage-cli",
            "classify",
            "--subject",
            "Help",
            "--body",
            "It broke",
            "--sender",
            "a@b.c",
        ])
        .unwrap();
        match cli.command {
            Commands::Classify { message } => {
                assert_eq!(message.subject, "Help");
                assert_eq!(message.body, "It broke");
                assert_eq!(message.sender, "a@b.c");
            }
            _ => panic!("expected classify"),
        }
    }
}
