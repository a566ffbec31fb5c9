//! # Error Handling
//!
//! This module provides unified error handling for the OpenSesame API,
//! implementing a consistent problem+json response format with trace ID propagation.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::connectors::ProviderError;
use crate::projects::{ExternalSyncFailed, QueryFilterError};
use crate::repositories::ProjectRepositoryError;
use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Developer-facing error message
    pub message: Box<str>,
    /// Message safe to show to end users (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<Box<str>>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            user_message: None,
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Attach a user-facing message
    pub fn with_user_message<S: Into<String>>(mut self, message: S) -> Self {
        self.user_message = Some(message.into().into_boxed_str());
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Extract current trace ID from the request context (falls back to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                let id = uuid::Uuid::new_v4().simple().to_string();
                Some(format!("corr-{}", &id[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

// Error mappers for common sources

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<QueryFilterError> for ApiError {
    fn from(error: QueryFilterError) -> Self {
        tracing::debug!(error = %error, "Rejected project filter");
        Self::new(
            error.status_code(),
            "VALIDATION_FAILED".to_string(),
            error.developer_message(),
        )
        .with_user_message(error.user_message())
    }
}

impl From<ExternalSyncFailed> for ApiError {
    fn from(error: ExternalSyncFailed) -> Self {
        let details = json!({
            "provider": "github",
            "repository_id": error.repository_id,
            "reason": error.source.to_string(),
        });

        match &error.source {
            ProviderError::NotFound { repository_id } => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND".to_string(),
                format!("GitHub repository '{}' not found", repository_id),
            ),
            ProviderError::RateLimited { retry_after } => {
                let api_error = Self::new(
                    StatusCode::BAD_GATEWAY,
                    "PROVIDER_ERROR",
                    "GitHub rate limit reached",
                )
                .with_details(details);
                match retry_after {
                    Some(seconds) => api_error.with_retry_after(*seconds),
                    None => api_error,
                }
            }
            _ => Self::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR".to_string(),
                format!("Failed to sync repository '{}' with GitHub", error.repository_id),
            )
            .with_details(details),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(error: ProviderError) -> Self {
        let repository_id = match &error {
            ProviderError::NotFound { repository_id } => repository_id.clone(),
            _ => String::new(),
        };
        ExternalSyncFailed {
            repository_id,
            source: error,
        }
        .into()
    }
}

impl From<ProjectRepositoryError> for ApiError {
    fn from(error: ProjectRepositoryError) -> Self {
        match error {
            ProjectRepositoryError::Database(err) => err.into(),
            ProjectRepositoryError::Sync(err) => err.into(),
            ProjectRepositoryError::Worker(details) => {
                anyhow::anyhow!("sweep worker failed: {}", details).into()
            }
        }
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}
