//! Ingestion pipeline.
//!
//! One run: fetch from the configured source, then per message normalize,
//! dedup, classify, persist and (for urgent mail) auto-draft a reply. After
//! the batch the daily analytics for every touched day are recomputed.
//!
//! Per-message trouble never aborts a run. Only a source failure or a
//! storage failure does.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use shared_types::{Email, NewEmail, NewResponse};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::dedup::DedupGate;
use super::normalize::normalize;
use super::source::{MessageSource, ProviderMessage};
use crate::ai::{Classifier, ResponseGenerator};
use crate::error::IngestError;
use crate::repository::EmailStore;
use crate::services::AnalyticsService;

/// Statistics from one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub fetched: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub auto_drafted: usize,
    pub draft_failures: usize,
}

/// What happened to a single fetched message
#[derive(Debug, Clone)]
pub enum MessageOutcome {
    /// Could not be normalized
    Skipped,
    /// Already seen, in this batch or in storage
    Duplicate,
    Persisted { email: Email, draft: DraftOutcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOutcome {
    NotNeeded,
    Drafted(Uuid),
    /// Generation succeeded but the draft could not be stored
    Failed,
}

pub struct IngestionPipeline {
    source: Arc<dyn MessageSource>,
    classifier: Classifier,
    generator: ResponseGenerator,
    store: Arc<dyn EmailStore>,
    analytics: AnalyticsService,
    run_lock: Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn MessageSource>,
        classifier: Classifier,
        generator: ResponseGenerator,
        store: Arc<dyn EmailStore>,
    ) -> Self {
        Self {
            analytics: AnalyticsService::new(store.clone()),
            source,
            classifier,
            generator,
            store,
            run_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> Arc<dyn EmailStore> {
        self.store.clone()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn generator(&self) -> &ResponseGenerator {
        &self.generator
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Run one full ingestion pass. Concurrent callers wait for the run in
    /// progress to finish before starting their own.
    pub async fn run_ingestion(&self) -> Result<IngestionReport, IngestError> {
        let _guard = self.run_lock.lock().await;

        let messages = self
            .source
            .fetch_new()
            .await
            .map_err(|error| IngestError::Source {
                provider: self.source.name(),
                error,
            })?;

        let mut report = IngestionReport {
            fetched: messages.len(),
            ..Default::default()
        };
        let mut gate = DedupGate::new();
        let mut touched_days: BTreeSet<NaiveDate> = BTreeSet::new();
        touched_days.insert(Utc::now().date_naive());

        for message in &messages {
            match self.process_message(message, &mut gate).await? {
                MessageOutcome::Skipped => report.skipped += 1,
                MessageOutcome::Duplicate => report.duplicates += 1,
                MessageOutcome::Persisted { email, draft } => {
                    report.persisted += 1;
                    touched_days.insert(email.received_at.date_naive());
                    match draft {
                        DraftOutcome::Drafted(_) => report.auto_drafted += 1,
                        DraftOutcome::Failed => report.draft_failures += 1,
                        DraftOutcome::NotNeeded => {}
                    }
                }
            }
        }

        for day in touched_days {
            self.analytics.refresh_day(day).await?;
        }

        if report.fetched > 0 {
            tracing::info!(
                "Ingested from {}: {} fetched, {} persisted, {} duplicates, {} skipped, {} auto-drafted, {} draft failures",
                self.source.name(),
                report.fetched,
                report.persisted,
                report.duplicates,
                report.skipped,
                report.auto_drafted,
                report.draft_failures
            );
        } else {
            tracing::debug!("No new messages from {}", self.source.name());
        }

        Ok(report)
    }

    /// Take one message through normalize, dedup, classify and persist
    pub async fn process_message(
        &self,
        message: &ProviderMessage,
        gate: &mut DedupGate,
    ) -> Result<MessageOutcome, IngestError> {
        let raw = match normalize(message) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Skipping message {}: {}", message.provider_id(), e);
                return Ok(MessageOutcome::Skipped);
            }
        };

        if !gate.admit(&raw, self.store.as_ref()).await? {
            return Ok(MessageOutcome::Duplicate);
        }

        let classification = self
            .classifier
            .classify(&raw.subject, &raw.body, &raw.sender)
            .await;
        let urgent = classification.is_urgent();

        let Some(email) = self
            .store
            .insert_email(NewEmail::new(raw, classification))
            .await?
        else {
            // Lost a race against another writer with the same message id
            return Ok(MessageOutcome::Duplicate);
        };
        tracing::debug!(
            "  Stored: {} [{} / {}] {}",
            email.message_id,
            email.priority.as_str(),
            email.sentiment.as_str(),
            email.subject
        );

        let draft = if urgent {
            self.auto_draft(&email).await
        } else {
            DraftOutcome::NotNeeded
        };

        Ok(MessageOutcome::Persisted { email, draft })
    }

    async fn auto_draft(&self, email: &Email) -> DraftOutcome {
        let reply = self
            .generator
            .generate(
                &email.subject,
                &email.body,
                &email.sender,
                &email.classification(),
            )
            .await;

        match self
            .store
            .insert_response(NewResponse::ai_draft(email.id, reply.content))
            .await
        {
            Ok(response) => {
                tracing::info!("Auto-drafted reply for urgent email {}", email.id);
                DraftOutcome::Drafted(response.id)
            }
            Err(e) => {
                tracing::error!("Failed to store auto-draft for email {}: {}", email.id, e);
                DraftOutcome::Failed
            }
        }
    }
}
