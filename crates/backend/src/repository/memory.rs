use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared_types::{
    DailyAnalytics, Email, EmailFilter, EmailStatus, EmailUpdate, NewEmail, NewResponse, Response,
    ResponseUpdate,
};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EmailStore, StoreResult};

#[derive(Default)]
struct Tables {
    emails: Vec<Email>,
    responses: Vec<Response>,
    analytics: BTreeMap<NaiveDate, DailyAnalytics>,
}

/// In-process store with the same contract as `PgStore`.
/// Used by the test suite and by `triage-cli ingest --dry-run`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn emails(&self) -> Vec<Email> {
        self.tables.read().await.emails.clone()
    }

    pub async fn responses(&self) -> Vec<Response> {
        self.tables.read().await.responses.clone()
    }

    pub async fn analytics(&self) -> Vec<DailyAnalytics> {
        self.tables.read().await.analytics.values().cloned().collect()
    }
}

#[async_trait]
impl EmailStore for MemoryStore {
    async fn find_by_message_id(&self, message_id: &str) -> StoreResult<Option<Email>> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .iter()
            .find(|e| e.message_id == message_id)
            .cloned())
    }

    async fn insert_email(&self, email: NewEmail) -> StoreResult<Option<Email>> {
        let mut tables = self.tables.write().await;
        if tables.emails.iter().any(|e| e.message_id == email.message_id) {
            return Ok(None);
        }

        let classification = email.classification;
        let stored = Email {
            id: Uuid::new_v4(),
            confidence_score: classification.confidence_percent(),
            message_id: email.message_id,
            subject: email.subject,
            sender: email.sender,
            sender_name: email.sender_name,
            body: email.body,
            html_body: email.html_body,
            received_at: email.received_at,
            processed_at: Utc::now(),
            sentiment: classification.sentiment,
            sentiment_score: classification.sentiment_score.clamp(-100, 100),
            priority: classification.priority,
            category: classification.category,
            extracted_info: classification.extracted_info,
            status: EmailStatus::Pending,
        };
        tables.emails.push(stored.clone());
        Ok(Some(stored))
    }

    async fn get_email(&self, id: Uuid) -> StoreResult<Option<Email>> {
        let tables = self.tables.read().await;
        Ok(tables.emails.iter().find(|e| e.id == id).cloned())
    }

    async fn update_email(&self, id: Uuid, update: EmailUpdate) -> StoreResult<Option<Email>> {
        let mut tables = self.tables.write().await;
        let Some(email) = tables.emails.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        if let Some(status) = update.status {
            email.status = status;
        }
        if let Some(priority) = update.priority {
            email.priority = priority;
        }
        Ok(Some(email.clone()))
    }

    async fn list_emails(&self, filter: &EmailFilter) -> StoreResult<Vec<Email>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Email> = tables
            .emails
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.priority.rank(), Reverse(e.received_at)));
        Ok(found
            .into_iter()
            .skip(filter.page_offset() as usize)
            .take(filter.page_limit() as usize)
            .collect())
    }

    async fn list_emails_received_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Email>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Email> = tables
            .emails
            .iter()
            .filter(|e| e.received_at >= start && e.received_at < end)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.received_at);
        Ok(found)
    }

    async fn insert_response(&self, response: NewResponse) -> StoreResult<Response> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let stored = Response {
            id: Uuid::new_v4(),
            email_id: response.email_id,
            content: response.content,
            is_ai_generated: response.is_ai_generated,
            sent_at: response.sent_at,
            created_at: now,
            updated_at: now,
        };
        tables.responses.push(stored.clone());
        Ok(stored)
    }

    async fn update_response(
        &self,
        id: Uuid,
        update: ResponseUpdate,
    ) -> StoreResult<Option<Response>> {
        let mut tables = self.tables.write().await;
        let Some(response) = tables.responses.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(content) = update.content {
            response.content = content;
        }
        if let Some(sent_at) = update.sent_at {
            response.sent_at = Some(sent_at);
        }
        response.updated_at = Utc::now();
        Ok(Some(response.clone()))
    }

    async fn list_responses(&self, email_id: Uuid) -> StoreResult<Vec<Response>> {
        let tables = self.tables.read().await;
        Ok(tables
            .responses
            .iter()
            .filter(|r| r.email_id == email_id)
            .cloned()
            .collect())
    }

    async fn upsert_daily_analytics(&self, stats: DailyAnalytics) -> StoreResult<DailyAnalytics> {
        let mut tables = self.tables.write().await;
        tables.analytics.insert(stats.date, stats.clone());
        Ok(stats)
    }

    async fn list_analytics(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<DailyAnalytics>> {
        if from > to {
            return Ok(Vec::new());
        }
        let tables = self.tables.read().await;
        Ok(tables
            .analytics
            .range(from..=to)
            .map(|(_, stats)| stats.clone())
            .collect())
    }
}
