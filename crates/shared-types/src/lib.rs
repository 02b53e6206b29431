use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "diesel")]
mod json_wrapper;
#[cfg(feature = "diesel")]
pub use json_wrapper::JsonWrapper;

/// Category assigned when the classifier has nothing better.
pub const DEFAULT_CATEGORY: &str = "General Inquiry";

// ============================================================================
// Classification Types
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Urgent => "urgent",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urgent" => Some(Priority::Urgent),
            "normal" => Some(Priority::Normal),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    /// Listing order: urgent before normal before low
    pub fn rank(&self) -> i32 {
        match self {
            Priority::Urgent => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

/// Workflow status of a persisted email
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    #[default]
    Pending,
    Resolved,
    Draft,
}

impl EmailStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Resolved => "resolved",
            EmailStatus::Draft => "draft",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EmailStatus::Pending),
            "resolved" => Some(EmailStatus::Resolved),
            "draft" => Some(EmailStatus::Draft),
            _ => None,
        }
    }
}

/// Structured details pulled out of an email by the classifier.
/// Stored as JSON text next to the email row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_email: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub urgency_indicators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_type: Option<String>,
}

/// Output of the classifier for one email.
///
/// `Default` is the fully degraded result: neutral, normal priority,
/// generic category and zero confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub sentiment: Sentiment,
    /// -100 (very negative) to 100 (very positive)
    pub sentiment_score: i32,
    /// 0.0 to 1.0
    pub confidence: f32,
    pub priority: Priority,
    pub category: String,
    pub extracted_info: ExtractedInfo,
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            sentiment_score: 0,
            confidence: 0.0,
            priority: Priority::Normal,
            category: DEFAULT_CATEGORY.to_string(),
            extracted_info: ExtractedInfo::default(),
        }
    }
}

impl ClassificationResult {
    /// Confidence as the 0-100 integer stored on the email row
    pub fn confidence_percent(&self) -> i32 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as i32
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }
}

/// Reply text produced by the response generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseGeneration {
    pub content: String,
    pub tone: String,
    pub confidence: f32,
}

// ============================================================================
// Email Types
// ============================================================================

/// Provider-agnostic message produced by the normalizer, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEmail {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub body: String,
    pub html_body: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Everything needed to insert an email row
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmail {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub body: String,
    pub html_body: Option<String>,
    pub received_at: DateTime<Utc>,
    pub classification: ClassificationResult,
}

impl NewEmail {
    pub fn new(raw: RawEmail, classification: ClassificationResult) -> Self {
        NewEmail {
            message_id: raw.message_id,
            subject: raw.subject,
            sender: raw.sender,
            sender_name: raw.sender_name,
            body: raw.body,
            html_body: raw.html_body,
            received_at: raw.received_at,
            classification,
        }
    }
}

/// Persisted email with its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: Uuid,
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub body: String,
    pub html_body: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub sentiment: Sentiment,
    pub sentiment_score: i32,
    /// 0 to 100
    pub confidence_score: i32,
    pub priority: Priority,
    pub category: String,
    pub extracted_info: ExtractedInfo,
    pub status: EmailStatus,
}

impl Email {
    /// Rebuild the classification from the stored columns, used when a
    /// reply is regenerated for an email that was classified earlier.
    pub fn classification(&self) -> ClassificationResult {
        ClassificationResult {
            sentiment: self.sentiment,
            sentiment_score: self.sentiment_score,
            confidence: self.confidence_score as f32 / 100.0,
            priority: self.priority,
            category: self.category.clone(),
            extracted_info: self.extracted_info.clone(),
        }
    }
}

/// Agent-driven changes to an email
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailUpdate {
    pub status: Option<EmailStatus>,
    pub priority: Option<Priority>,
}

/// Default page size for email listings
pub const DEFAULT_EMAIL_LIMIT: i64 = 50;
/// Largest page a single listing returns
pub const MAX_EMAIL_LIMIT: i64 = 500;

/// Filters for listing emails. Every set field must match; `search` is a
/// case-insensitive substring match on subject, sender or body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailFilter {
    pub status: Option<EmailStatus>,
    pub priority: Option<Priority>,
    pub sentiment: Option<Sentiment>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl EmailFilter {
    /// The search term, or `None` when it is blank
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn page_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_EMAIL_LIMIT)
            .clamp(1, MAX_EMAIL_LIMIT)
    }

    pub fn page_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// In-memory form of the store's filter, used by `MemoryStore`
    pub fn matches(&self, email: &Email) -> bool {
        if self.status.is_some_and(|s| s != email.status)
            || self.priority.is_some_and(|p| p != email.priority)
            || self.sentiment.is_some_and(|s| s != email.sentiment)
        {
            return false;
        }
        match self.search_term() {
            Some(term) => {
                let term = term.to_lowercase();
                [&email.subject, &email.sender, &email.body]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewResponse {
    pub email_id: Uuid,
    pub content: String,
    pub is_ai_generated: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NewResponse {
    /// An unsent, AI generated reply
    pub fn ai_draft(email_id: Uuid, content: String) -> Self {
        NewResponse {
            email_id,
            content,
            is_ai_generated: true,
            sent_at: None,
        }
    }
}

/// Reply attached to an email. A response without `sent_at` is a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: Uuid,
    pub email_id: Uuid,
    pub content: String,
    pub is_ai_generated: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Response {
    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponseRequest {
    pub content: String,
    #[serde(default)]
    pub is_ai_generated: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseUpdate {
    pub content: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Analytics Types
// ============================================================================

/// Aggregate counts for emails received on one calendar day (UTC)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAnalytics {
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
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentTotals {
    pub positive: i64,
    pub neutral: i64,
    pub negative: i64,
}

/// Stored daily snapshots for a date range plus summed sentiment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub days: Vec<DailyAnalytics>,
    pub sentiment: SentimentTotals,
}

/// Counters for emails received since midnight UTC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_today: i64,
    pub urgent: i64,
    pub resolved: i64,
    pub pending: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}
