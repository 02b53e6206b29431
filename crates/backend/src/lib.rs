//! Support mailbox triage: pulls support mail from an IMAP mailbox or the
//! Gmail API, classifies it, drafts replies for urgent mail and keeps daily
//! analytics. The server binary runs the pipeline on a timer and exposes it
//! over HTTP; `triage-cli` drives the same pieces from the command line.

use std::sync::Arc;

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
mod models;
pub mod pollers;
pub mod repository;
mod schema;
pub mod services;

#[cfg(test)]
mod testing;

use ai::{Classifier, LanguageModel, OpenAiClient, ResponseGenerator};
use config::AppConfig;
use pollers::{build_source, IngestionPipeline};
use repository::EmailStore;

/// The configured model client, or `None` when no API key is set
pub fn build_model(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn LanguageModel>>> {
    match &config.model {
        Some(model_config) => {
            let client = OpenAiClient::new(model_config.clone())?;
            tracing::info!("Using model {} for classification", model_config.model);
            Ok(Some(Arc::new(client)))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, classification runs in degraded mode");
            Ok(None)
        }
    }
}

/// Wire the configured source and model into a pipeline over `store`
pub fn build_pipeline(
    config: &AppConfig,
    store: Arc<dyn EmailStore>,
) -> anyhow::Result<IngestionPipeline> {
    let model = build_model(config)?;
    Ok(IngestionPipeline::new(
        build_source(&config.source),
        Classifier::new(model.clone()),
        ResponseGenerator::new(model),
        store,
    ))
}
