//! Persistence contract used by the ingestion pipeline and the API.
//!
//! The pipeline only ever appends and reads; the `message_id` uniqueness
//! constraint is the one piece of coordination the store must provide.
//! `PgStore` backs the server, `MemoryStore` backs tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared_types::{
    DailyAnalytics, Email, EmailFilter, EmailUpdate, NewEmail, NewResponse, Response, ResponseUpdate,
};
use uuid::Uuid;

use crate::error::StoreError;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EmailStore: Send + Sync {
    async fn find_by_message_id(&self, message_id: &str) -> StoreResult<Option<Email>>;

    /// Insert a classified email. Returns `Ok(None)` when an email with the
    /// same `message_id` already exists.
    async fn insert_email(&self, email: NewEmail) -> StoreResult<Option<Email>>;

    async fn get_email(&self, id: Uuid) -> StoreResult<Option<Email>>;

    async fn update_email(&self, id: Uuid, update: EmailUpdate) -> StoreResult<Option<Email>>;

    /// One page of emails matching `filter`, urgent first then newest first
    async fn list_emails(&self, filter: &EmailFilter) -> StoreResult<Vec<Email>>;

    /// Emails with `start <= received_at < end`
    async fn list_emails_received_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Email>>;

    async fn insert_response(&self, response: NewResponse) -> StoreResult<Response>;

    async fn update_response(
        &self,
        id: Uuid,
        update: ResponseUpdate,
    ) -> StoreResult<Option<Response>>;

    /// Responses for one email, oldest first
    async fn list_responses(&self, email_id: Uuid) -> StoreResult<Vec<Response>>;

    /// Insert or overwrite the snapshot for `stats.date`
    async fn upsert_daily_analytics(&self, stats: DailyAnalytics) -> StoreResult<DailyAnalytics>;

    /// Snapshots with `from <= date <= to`, oldest first
    async fn list_analytics(&self, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<DailyAnalytics>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that the trait stays object safe
    fn _assert_object_safe(_: &dyn EmailStore) {}

    fn _check_impls() {
        fn _check<T: EmailStore>() {}
        _check::<MemoryStore>();
        _check::<PgStore>();
    }
}
