//! # API Handlers
//!
//! This module contains all the HTTP endpoint handlers for the OpenSesame API.

pub mod admin;
pub mod auth;
pub mod projects;

use axum::{extract::State, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db;
use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    #[schema(example = "ok")]
    pub status: &'static str,
}

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Liveness and database health
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service and database are healthy", body = HealthStatus),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "root"
)]
pub async fn healthz(State(state): State<AppState>) -> Result<Json<HealthStatus>, ApiError> {
    db::health_check(&state.db).await.map_err(|e| {
        tracing::warn!(error = ?e, "Health check failed");
        ApiError::new(
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Database unavailable",
        )
    })?;
    Ok(Json(HealthStatus { status: "ok" }))
}

#[cfg(test)]
mod tests;
