//! Periodic ingestion task.
//!
//! Runs as a tokio background task within the server process and triggers
//! one pipeline run per interval.

use std::sync::Arc;
use std::time::Duration;

use super::processor::IngestionPipeline;

/// Start the ingestion background task. Never returns.
pub async fn start_ingestion_task(pipeline: Arc<IngestionPipeline>, interval: Duration) {
    tracing::info!(
        "Starting ingestion task for {} (interval: {:?})",
        pipeline.source_name(),
        interval
    );

    loop {
        if let Err(e) = pipeline.run_ingestion().await {
            tracing::error!("Ingestion run failed: {}", e);
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Classifier, ResponseGenerator};
    use crate::repository::MemoryStore;
    use crate::testing::{rfc822, StaticSource};

    #[tokio::test]
    async fn test_task_keeps_running_after_failed_runs() {
        let pipeline = Arc::new(IngestionPipeline::new(
            StaticSource::failing("mailbox offline"),
            Classifier::new(None),
            ResponseGenerator::new(None),
            Arc::new(MemoryStore::new()),
        ));

        let handle = tokio::spawn(start_ingestion_task(pipeline, Duration::from_millis(5)));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test]
    async fn test_task_ingests_on_first_tick() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = Arc::new(IngestionPipeline::new(
            StaticSource::new(vec![rfc822(7, "<tick@x>", "a@b.c", "Hello", "Body")]),
            Classifier::new(None),
            ResponseGenerator::new(None),
            store.clone(),
        ));

        let handle = tokio::spawn(start_ingestion_task(pipeline, Duration::from_secs(3600)));
        for _ in 0..50 {
            if !store.emails().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(store.emails().await.len(), 1);
    }
}
