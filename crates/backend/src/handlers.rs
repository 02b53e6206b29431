use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use shared_types::{
    AnalyticsSummary, CategoryCount, ClassificationResult, CreateResponseRequest, DashboardStats,
    Email, EmailFilter, EmailUpdate, Response, ResponseUpdate,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::pollers::{IngestionPipeline, IngestionReport};
use crate::repository::EmailStore;
use crate::services::{AnalyticsService, RegeneratedDraft, ResponseService};

const DEFAULT_ANALYTICS_DAYS: u32 = 7;
const MAX_ANALYTICS_DAYS: u32 = 365;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub store: Arc<dyn EmailStore>,
    pub analytics: AnalyticsService,
    pub responses: ResponseService,
}

impl AppState {
    pub fn new(pipeline: Arc<IngestionPipeline>) -> Self {
        let store = pipeline.store();
        Self {
            analytics: AnalyticsService::new(store.clone()),
            responses: ResponseService::new(store.clone(), pipeline.generator().clone()),
            store,
            pipeline,
        }
    }
}

/// All API routes. Layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Email routes
        .route("/api/emails", get(list_emails))
        .route("/api/emails/refresh", post(refresh_emails))
        .route("/api/emails/:id", get(get_email).patch(update_email))
        .route(
            "/api/emails/:id/responses",
            get(list_responses).post(create_response),
        )
        .route(
            "/api/emails/:id/generate-response",
            post(generate_response),
        )
        // Response routes
        .route("/api/responses/:id", patch(update_response))
        // Standalone tools
        .route("/api/classify", post(classify))
        .route("/api/dashboard/stats", get(get_dashboard_stats))
        .route("/api/analytics", get(get_analytics))
        .route("/api/analytics/categories", get(get_categories))
        .with_state(state)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

// Email handlers
pub async fn list_emails(
    State(state): State<AppState>,
    Query(filter): Query<EmailFilter>,
) -> ApiResult<Json<Vec<Email>>> {
    let emails = state.store.list_emails(&filter).await?;
    Ok(Json(emails))
}

pub async fn refresh_emails(State(state): State<AppState>) -> ApiResult<Json<IngestionReport>> {
    let report = state.pipeline.run_ingestion().await?;
    Ok(Json(report))
}

pub async fn get_email(
    State(state): State<AppState>,
    Path(email_id): Path<Uuid>,
) -> ApiResult<Json<Email>> {
    let email = state
        .store
        .get_email(email_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("email {}", email_id)))?;
    Ok(Json(email))
}

pub async fn update_email(
    State(state): State<AppState>,
    Path(email_id): Path<Uuid>,
    Json(update): Json<EmailUpdate>,
) -> ApiResult<Json<Email>> {
    if update.status.is_none() && update.priority.is_none() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    let email = state
        .store
        .update_email(email_id, update)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("email {}", email_id)))?;
    Ok(Json(email))
}

// Response handlers
pub async fn list_responses(
    State(state): State<AppState>,
    Path(email_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Response>>> {
    let responses = state.responses.list_responses(email_id).await?;
    Ok(Json(responses))
}

pub async fn create_response(
    State(state): State<AppState>,
    Path(email_id): Path<Uuid>,
    Json(request): Json<CreateResponseRequest>,
) -> ApiResult<(StatusCode, Json<Response>)> {
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request("Response content cannot be empty"));
    }

    let response = state.responses.create_response(email_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_response(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
    Json(update): Json<ResponseUpdate>,
) -> ApiResult<Json<Response>> {
    if update.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(ApiError::bad_request("Response content cannot be empty"));
    }

    let response = state.responses.update_response(response_id, update).await?;
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponseRequest {
    pub knowledge_base: Option<String>,
}

pub async fn generate_response(
    State(state): State<AppState>,
    Path(email_id): Path<Uuid>,
    payload: Option<Json<GenerateResponseRequest>>,
) -> ApiResult<(StatusCode, Json<RegeneratedDraft>)> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let draft = state
        .responses
        .regenerate_draft(email_id, request.knowledge_base.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(draft)))
}

// Standalone classification
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub sender: String,
}

pub async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> ApiResult<Json<ClassificationResult>> {
    if request.subject.trim().is_empty() && request.body.trim().is_empty() {
        return Err(ApiError::bad_request("Subject or body is required"));
    }

    let result = state
        .pipeline
        .classifier()
        .classify(&request.subject, &request.body, &request.sender)
        .await;
    Ok(Json(result))
}

// Analytics
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<u32>,
}

impl AnalyticsQuery {
    fn days(&self) -> ApiResult<u32> {
        let days = self.days.unwrap_or(DEFAULT_ANALYTICS_DAYS);
        if days == 0 || days > MAX_ANALYTICS_DAYS {
            return Err(ApiError::bad_request(format!(
                "days must be between 1 and {}",
                MAX_ANALYTICS_DAYS
            )));
        }
        Ok(days)
    }
}

pub async fn get_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<AnalyticsSummary>> {
    let summary = state.analytics.summary(query.days()?).await?;
    Ok(Json(summary))
}

pub async fn get_categories(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<Vec<CategoryCount>>> {
    let categories = state.analytics.category_distribution(query.days()?).await?;
    Ok(Json(categories))
}

pub async fn get_dashboard_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<DashboardStats>> {
    let stats = state.analytics.dashboard_stats().await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Classifier, ResponseGenerator};
    use crate::repository::MemoryStore;
    use crate::testing::{rfc822, StaticSource};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let pipeline = Arc::new(IngestionPipeline::new(
            StaticSource::new(vec![rfc822(
                1,
                "<api@x>",
                "Dana <dana@example.com>",
                "Cannot log in",
                "My password reset never arrives",
            )]),
            Classifier::new(None),
            ResponseGenerator::new(None),
            store.clone(),
        ));
        (router(AppState::new(pipeline)), store)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn ingest(app: &Router) {
        let (status, report) = send(app, Method::POST, "/api/emails/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["persisted"], 1);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, _) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_then_fetch_email() {
        let (app, store) = app();
        ingest(&app).await;
        let id = store.emails().await[0].id;

        let (status, email) = send(&app, Method::GET, &format!("/api/emails/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(email["messageId"], "<api@x>");
        assert_eq!(email["senderName"], "Dana");
        assert_eq!(email["status"], "pending");
        assert_eq!(email["category"], "General Inquiry");
    }

    #[tokio::test]
    async fn test_unknown_email_is_404() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/emails/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_patch_email_priority() {
        let (app, store) = app();
        ingest(&app).await;
        let id = store.emails().await[0].id;

        let (status, email) = send(
            &app,
            Method::PATCH,
            &format!("/api/emails/{}", id),
            Some(json!({"priority": "urgent"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(email["priority"], "urgent");

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/emails/{}", id),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sending_response_resolves_email() {
        let (app, store) = app();
        ingest(&app).await;
        let id = store.emails().await[0].id;

        let (status, created) = send(
            &app,
            Method::POST,
            &format!("/api/emails/{}/responses", id),
            Some(json!({"content": "Try resetting again"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["sentAt"], Value::Null);

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/responses/{}", created["id"].as_str().unwrap()),
            Some(json!({"sentAt": "2024-03-05T10:00:00Z"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, email) = send(&app, Method::GET, &format!("/api/emails/{}", id), None).await;
        assert_eq!(email["status"], "resolved");

        let (status, list) = send(
            &app,
            Method::GET,
            &format!("/api/emails/{}/responses", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_response_without_body() {
        let (app, store) = app();
        ingest(&app).await;
        let id = store.emails().await[0].id;

        let (status, draft) = send(
            &app,
            Method::POST,
            &format!("/api/emails/{}/generate-response", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(draft["response"]["isAiGenerated"], true);
        assert_eq!(draft["tone"], "professional");
        assert_eq!(store.responses().await.len(), 1);
    }

    #[tokio::test]
    async fn test_classify_requires_content() {
        let (app, _) = app();
        let (status, _) = send(&app, Method::POST, "/api/classify", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, result) = send(
            &app,
            Method::POST,
            "/api/classify",
            Some(json!({"subject": "Hi", "body": "Thanks!"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["priority"], "normal");
        assert_eq!(result["sentiment"], "neutral");
    }

    #[tokio::test]
    async fn test_analytics_after_refresh() {
        let (app, _) = app();
        ingest(&app).await;

        let (status, summary) = send(&app, Method::GET, "/api/analytics?days=3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(summary["days"].as_array().is_some());

        let (status, _) = send(&app, Method::GET, "/api/analytics?days=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_emails_with_filters() {
        let (app, _) = app();
        ingest(&app).await;

        let (status, list) = send(&app, Method::GET, "/api/emails", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["messageId"], "<api@x>");

        let (status, list) = send(
            &app,
            Method::GET,
            "/api/emails?status=pending&priority=normal&search=PASSWORD",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (_, list) = send(&app, Method::GET, "/api/emails?priority=urgent", None).await;
        assert!(list.as_array().unwrap().is_empty());

        let (_, list) = send(&app, Method::GET, "/api/emails?offset=1&limit=5", None).await;
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_stats_and_categories() {
        let (app, store) = app();
        ingest(&app).await;

        // The fixture message is dated in the past; today's counters start empty
        let (status, stats) = send(&app, Method::GET, "/api/dashboard/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            stats,
            json!({"totalToday": 0, "urgent": 0, "resolved": 0, "pending": 0})
        );

        store
            .insert_email(shared_types::NewEmail::new(
                shared_types::RawEmail {
                    message_id: "<today@x>".into(),
                    subject: "Site down".into(),
                    sender: "ops@example.com".into(),
                    sender_name: None,
                    body: "Nothing loads".into(),
                    html_body: None,
                    received_at: chrono::Utc::now(),
                },
                ClassificationResult {
                    priority: shared_types::Priority::Urgent,
                    category: "Technical Support".into(),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        let (_, stats) = send(&app, Method::GET, "/api/dashboard/stats", None).await;
        assert_eq!(
            stats,
            json!({"totalToday": 1, "urgent": 1, "resolved": 0, "pending": 1})
        );

        let (status, categories) =
            send(&app, Method::GET, "/api/analytics/categories", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            categories,
            json!([{"category": "Technical Support", "count": 1}])
        );

        let (status, _) =
            send(&app, Method::GET, "/api/analytics/categories?days=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
