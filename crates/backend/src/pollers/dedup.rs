use shared_types::RawEmail;
use std::collections::HashSet;

use crate::error::StoreError;
use crate::repository::EmailStore;

/// Admission check run before a message is classified.
///
/// Rejects ids already admitted earlier in the same batch and ids that are
/// already persisted. One gate lives for exactly one ingestion run.
#[derive(Debug, Default)]
pub struct DedupGate {
    seen_in_batch: HashSet<String>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn admit(
        &mut self,
        email: &RawEmail,
        store: &dyn EmailStore,
    ) -> Result<bool, StoreError> {
        if self.seen_in_batch.contains(&email.message_id) {
            tracing::debug!("Duplicate within batch: {}", email.message_id);
            return Ok(false);
        }

        if store.find_by_message_id(&email.message_id).await?.is_some() {
            tracing::debug!("Already processed: {}", email.message_id);
            return Ok(false);
        }

        self.seen_in_batch.insert(email.message_id.clone());
        Ok(true)
    }
}
