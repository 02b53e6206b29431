// Database models for Diesel
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use shared_types::{
    DailyAnalytics, Email, EmailStatus, ExtractedInfo, JsonWrapper, NewEmail, NewResponse,
    Priority, Response, Sentiment,
};
use uuid::Uuid;

/// Database representation of emails.
/// Enum columns are lowercase strings, `extracted_info` is JSON stored as TEXT.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::emails)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmailRow {
    pub id: Uuid,
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub body: String,
    pub html_body: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub sentiment: String,
    pub sentiment_score: i32,
    pub confidence_score: i32,
    pub priority: String,
    pub category: String,
    pub extracted_info: JsonWrapper<ExtractedInfo>,
    pub status: String,
}

impl From<EmailRow> for Email {
    fn from(row: EmailRow) -> Self {
        Email {
            id: row.id,
            message_id: row.message_id,
            subject: row.subject,
            sender: row.sender,
            sender_name: row.sender_name,
            body: row.body,
            html_body: row.html_body,
            received_at: row.received_at,
            processed_at: row.processed_at,
            sentiment: Sentiment::from_str(&row.sentiment).unwrap_or_default(),
            sentiment_score: row.sentiment_score,
            confidence_score: row.confidence_score,
            priority: Priority::from_str(&row.priority).unwrap_or_default(),
            category: row.category,
            extracted_info: row.extracted_info.into_inner(),
            status: EmailStatus::from_str(&row.status).unwrap_or_default(),
        }
    }
}

/// Insertable struct for new emails
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::emails)]
pub struct NewEmailRow {
    pub id: Uuid,
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub body: String,
    pub html_body: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub sentiment: String,
    pub sentiment_score: i32,
    pub confidence_score: i32,
    pub priority: String,
    pub category: String,
    pub extracted_info: JsonWrapper<ExtractedInfo>,
    pub status: String,
}

impl NewEmailRow {
    /// Build the row for a freshly classified email. Scores are clamped
    /// again here since this is the last stop before the CHECK constraints.
    pub fn from_new_email(email: NewEmail, processed_at: DateTime<Utc>) -> Self {
        let classification = email.classification;
        NewEmailRow {
            id: Uuid::new_v4(),
            message_id: email.message_id,
            subject: email.subject,
            sender: email.sender,
            sender_name: email.sender_name,
            body: email.body,
            html_body: email.html_body,
            received_at: email.received_at,
            processed_at,
            sentiment: classification.sentiment.as_str().to_string(),
            sentiment_score: classification.sentiment_score.clamp(-100, 100),
            confidence_score: classification.confidence_percent(),
            priority: classification.priority.as_str().to_string(),
            category: classification.category,
            extracted_info: JsonWrapper(classification.extracted_info),
            status: EmailStatus::Pending.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::responses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ResponseRow {
    pub id: Uuid,
    pub email_id: Uuid,
    pub content: String,
    pub is_ai_generated: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ResponseRow> for Response {
    fn from(row: ResponseRow) -> Self {
        Response {
            id: row.id,
            email_id: row.email_id,
            content: row.content,
            is_ai_generated: row.is_ai_generated,
            sent_at: row.sent_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::responses)]
pub struct NewResponseRow {
    pub id: Uuid,
    pub email_id: Uuid,
    pub content: String,
    pub is_ai_generated: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<NewResponse> for NewResponseRow {
    fn from(response: NewResponse) -> Self {
        NewResponseRow {
            id: Uuid::new_v4(),
            email_id: response.email_id,
            content: response.content,
            is_ai_generated: response.is_ai_generated,
            sent_at: response.sent_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::email_analytics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AnalyticsRow {
    pub id: Uuid,
    pub date: NaiveDate,
    pub total_emails: i32,
    pub urgent_emails: i32,
    pub normal_emails: i32,
    pub low_emails: i32,
    pub resolved_emails: i32,
    pub pending_emails: i32,
    pub positive_emails: i32,
    pub neutral_emails: i32,
    pub negative_emails: i32,
    pub avg_response_time_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AnalyticsRow> for DailyAnalytics {
    fn from(row: AnalyticsRow) -> Self {
        DailyAnalytics {
            date: row.date,
            total_emails: row.total_emails,
            urgent_emails: row.urgent_emails,
            normal_emails: row.normal_emails,
            low_emails: row.low_emails,
            resolved_emails: row.resolved_emails,
            pending_emails: row.pending_emails,
            positive_emails: row.positive_emails,
            neutral_emails: row.neutral_emails,
            negative_emails: row.negative_emails,
            avg_response_time_minutes: row.avg_response_time_minutes,
        }
    }
}

/// Insert and upsert-update shape for daily analytics (keyed by `date`)
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::email_analytics)]
pub struct AnalyticsUpsert {
    pub date: NaiveDate,
    pub total_emails: i32,
    pub urgent_emails: i32,
    pub normal_emails: i32,
    pub low_emails: i32,
    pub resolved_emails: i32,
    pub pending_emails: i32,
    pub positive_emails: i32,
    pub neutral_emails: i32,
    pub negative_emails: i32,
    pub avg_response_time_minutes: i32,
    pub updated_at: DateTime<Utc>,
}

impl AnalyticsUpsert {
    pub fn new(stats: &DailyAnalytics, updated_at: DateTime<Utc>) -> Self {
        AnalyticsUpsert {
            date: stats.date,
            total_emails: stats.total_emails,
            urgent_emails: stats.urgent_emails,
            normal_emails: stats.normal_emails,
            low_emails: stats.low_emails,
            resolved_emails: stats.resolved_emails,
            pending_emails: stats.pending_emails,
            positive_emails: stats.positive_emails,
            neutral_emails: stats.neutral_emails,
            negative_emails: stats.negative_emails,
            avg_response_time_minutes: stats.avg_response_time_minutes,
            updated_at,
        }
    }
}
