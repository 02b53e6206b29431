use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use shared_types::{
    DailyAnalytics, Email, EmailFilter, EmailUpdate, NewEmail, NewResponse, Response, ResponseUpdate,
};
use uuid::Uuid;

use super::{EmailStore, StoreResult};
use crate::db::{self, DbPool};
use crate::models::{AnalyticsUpsert, NewEmailRow, NewResponseRow};

/// `EmailStore` over the diesel-async connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailStore for PgStore {
    async fn find_by_message_id(&self, message_id: &str) -> StoreResult<Option<Email>> {
        let mut conn = self.pool.get().await?;
        let row = db::emails::find_by_message_id(&mut conn, message_id).await?;
        Ok(row.map(Email::from))
    }

    async fn insert_email(&self, email: NewEmail) -> StoreResult<Option<Email>> {
        let mut conn = self.pool.get().await?;
        let row = NewEmailRow::from_new_email(email, Utc::now());

        match db::emails::insert(&mut conn, row).await {
            Ok(inserted) => Ok(inserted.map(Email::from)),
            // ON CONFLICT already covers this; a racing writer can still trip it
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_email(&self, id: Uuid) -> StoreResult<Option<Email>> {
        let mut conn = self.pool.get().await?;
        let row = db::emails::get_by_id(&mut conn, id).await?;
        Ok(row.map(Email::from))
    }

    async fn update_email(&self, id: Uuid, update: EmailUpdate) -> StoreResult<Option<Email>> {
        let mut conn = self.pool.get().await?;
        let row = db::emails::update(&mut conn, id, update.status, update.priority).await?;
        Ok(row.map(Email::from))
    }

    async fn list_emails(&self, filter: &EmailFilter) -> StoreResult<Vec<Email>> {
        let mut conn = self.pool.get().await?;
        let rows = db::emails::list(&mut conn, filter).await?;
        Ok(rows.into_iter().map(Email::from).collect())
    }

    async fn list_emails_received_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Email>> {
        let mut conn = self.pool.get().await?;
        let rows = db::emails::list_received_between(&mut conn, start, end).await?;
        Ok(rows.into_iter().map(Email::from).collect())
    }

    async fn insert_response(&self, response: NewResponse) -> StoreResult<Response> {
        let mut conn = self.pool.get().await?;
        let row = db::responses::insert(&mut conn, NewResponseRow::from(response)).await?;
        Ok(row.into())
    }

    async fn update_response(
        &self,
        id: Uuid,
        update: ResponseUpdate,
    ) -> StoreResult<Option<Response>> {
        let mut conn = self.pool.get().await?;
        let row =
            db::responses::update(&mut conn, id, update.content.as_deref(), update.sent_at).await?;
        Ok(row.map(Response::from))
    }

    async fn list_responses(&self, email_id: Uuid) -> StoreResult<Vec<Response>> {
        let mut conn = self.pool.get().await?;
        let rows = db::responses::list_for_email(&mut conn, email_id).await?;
        Ok(rows.into_iter().map(Response::from).collect())
    }

    async fn upsert_daily_analytics(&self, stats: DailyAnalytics) -> StoreResult<DailyAnalytics> {
        let mut conn = self.pool.get().await?;
        let row = db::analytics::upsert(&mut conn, AnalyticsUpsert::new(&stats, Utc::now())).await?;
        Ok(row.into())
    }

    async fn list_analytics(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<DailyAnalytics>> {
        let mut conn = self.pool.get().await?;
        let rows = db::analytics::list_between(&mut conn, from, to).await?;
        Ok(rows.into_iter().map(DailyAnalytics::from).collect())
    }
}
