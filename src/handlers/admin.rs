//! # Admin API Handlers
//!
//! Operator-only maintenance endpoints.

use axum::{extract::State, response::Json};

use crate::error::ApiError;
use crate::repositories::SweepReport;
use crate::server::AppState;

/// Refresh every project whose GitHub data is stale
#[utoipa::path(
    post,
    path = "/admin/projects/refresh",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep finished; failed projects are listed and were left unchanged", body = SweepReport, example = json!({
            "examined": 3,
            "refreshed": 2,
            "failures": [{"repository_id": "1296269", "reason": "rate limited by provider (retry after Some(60)s)"}]
        })),
        (status = 401, description = "Missing or invalid operator token", body = ApiError),
        (status = 500, description = "Sweep could not run", body = ApiError)
    ),
    tag = "admin"
)]
pub async fn refresh_projects(State(state): State<AppState>) -> Result<Json<SweepReport>, ApiError> {
    let report = state.projects.refresh_stale().await?;
    Ok(Json(report))
}
