//! Error types shared across the backend.
//!
//! `StoreError` is what every `EmailStore` returns, `IngestError` is the only
//! thing that can escape an ingestion run, and `ApiError` turns both into
//! HTTP responses so handlers can use `?` directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel_async::pooled_connection::deadpool::PoolError;
use serde::Serialize;
use thiserror::Error;

/// Failure of the persistence collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection pool error
    #[error("database connection error: {0}")]
    ConnectionPool(#[from] PoolError),

    /// Database query error
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Referenced record does not exist
    #[error("{0} not found")]
    NotFound(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }
}

/// Errors that abort an ingestion run.
///
/// Everything content-level (bad messages, classifier or generator trouble)
/// is absorbed inside the run; only these two reach the caller.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Connection, auth or timeout failure talking to the provider
    #[error("message source '{provider}' failed: {error:#}")]
    Source {
        provider: &'static str,
        #[source]
        error: anyhow::Error,
    },

    /// Persistence failure other than a duplicate message id
    #[error("storage failure during ingestion: {0}")]
    Storage(#[from] StoreError),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Create a not found error with a custom message
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    fn parts(&self) -> (StatusCode, String, Option<String>) {
        match self {
            ApiError::Store(StoreError::NotFound(what)) | ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{} not found", what), None)
            }
            ApiError::Store(StoreError::ConnectionPool(e)) => {
                tracing::error!("Connection pool error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Database connection unavailable".to_string(),
                    None,
                )
            }
            ApiError::Store(e) => {
                tracing::error!("Store error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    None,
                )
            }
            ApiError::Ingest(IngestError::Source { provider, error }) => {
                tracing::error!("Ingestion source {} failed: {:#}", provider, error);
                (
                    StatusCode::BAD_GATEWAY,
                    "Email provider unavailable".to_string(),
                    Some(format!("{:#}", error)),
                )
            }
            ApiError::Ingest(IngestError::Storage(e)) => {
                tracing::error!("Ingestion storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ingestion failed while saving results".to_string(),
                    None,
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = self.parts();

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let (status, msg, _) = ApiError::from(StoreError::not_found("email abc")).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(msg, "email abc not found");
    }

    #[test]
    fn test_source_failure_maps_to_bad_gateway() {
        let err = IngestError::Source {
            provider: "imap",
            error: anyhow::anyhow!("login rejected"),
        };
        assert_eq!(
            err.to_string(),
            "message source 'imap' failed: login rejected"
        );
        let (status, _, details) = ApiError::from(err).parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(details.as_deref(), Some("login rejected"));
    }

    #[test]
    fn test_bad_request_keeps_message() {
        let (status, msg, details) = ApiError::bad_request("days must be positive").parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "days must be positive");
        assert!(details.is_none());
    }
}
