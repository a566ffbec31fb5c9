//! # Projects API Handlers
//!
//! Querying, lookup and membership endpoints for projects. Every project returned
//! here has GitHub data no older than the configured maximum age.

use axum::{
    extract::{Path, RawQuery, State},
    response::Json,
};
use tracing::info;
use url::form_urlencoded;

use crate::auth::RequireUser;
use crate::connectors::RepositorySummary;
use crate::error::ApiError;
use crate::projects::{ProjectRecord, QueryFilter};
use crate::server::AppState;

/// Name of the repeatable query parameter carrying filter strings
pub const FILTER_PARAM: &str = "filter";

/// Collect every `filter` value from a raw query string.
fn filter_strings(query: Option<&str>) -> Vec<String> {
    query
        .map(|query| {
            form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == FILTER_PARAM)
                .map(|(_, value)| value.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// List projects matching all given filters
#[utoipa::path(
    get,
    path = "/projects",
    params(
        ("filter" = Option<Vec<String>>, Query,
            description = "Filter of the form `<field> <comparator> <value>`; repeat to combine",
            example = "numMentors >= 2")
    ),
    responses(
        (status = 200, description = "Matching projects", body = Vec<ProjectRecord>),
        (status = 400, description = "Invalid filter", body = ApiError),
        (status = 502, description = "GitHub sync failed", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<ProjectRecord>>, ApiError> {
    let filters = QueryFilter::parse_all(filter_strings(query.as_deref()))?;
    let projects = state.projects.query(&filters).await?;
    Ok(Json(projects))
}

/// Get a project, creating it on first access
#[utoipa::path(
    get,
    path = "/projects/{repository_id}",
    params(("repository_id" = String, Path, description = "GitHub repository id")),
    responses(
        (status = 200, description = "The project", body = ProjectRecord),
        (status = 404, description = "Repository does not exist on GitHub", body = ApiError),
        (status = 502, description = "GitHub sync failed", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(repository_id): Path<String>,
) -> Result<Json<ProjectRecord>, ApiError> {
    let project = state.projects.get_or_create(&repository_id).await?;
    Ok(Json(project))
}

/// GitHub metadata for a project's repository
#[utoipa::path(
    get,
    path = "/projects/{repository_id}/github",
    params(("repository_id" = String, Path, description = "GitHub repository id")),
    responses(
        (status = 200, description = "Repository summary", body = RepositorySummary),
        (status = 404, description = "Repository does not exist on GitHub", body = ApiError),
        (status = 502, description = "GitHub request failed", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn get_repository(
    State(state): State<AppState>,
    Path(repository_id): Path<String>,
) -> Result<Json<RepositorySummary>, ApiError> {
    let summary = state.projects.provider().repository(&repository_id).await?;
    Ok(Json(summary))
}

#[derive(Debug, Clone, Copy)]
enum Membership {
    Mentor,
    Interested,
}

async fn update_membership(
    state: &AppState,
    repository_id: &str,
    user_id: &str,
    membership: Membership,
    join: bool,
) -> Result<ProjectRecord, ApiError> {
    let mut project = state.projects.get_or_create(repository_id).await?;

    let changed = match (membership, join) {
        (Membership::Mentor, true) => project.add_mentor(user_id),
        (Membership::Mentor, false) => project.remove_mentor(user_id),
        (Membership::Interested, true) => project.add_interested_user(user_id),
        (Membership::Interested, false) => project.remove_interested_user(user_id),
    };

    if changed {
        state.projects.save(&mut project).await?;
        info!(repository_id, user_id, ?membership, join, "Updated project membership");
    }
    Ok(project)
}

/// Sign up as a mentor
#[utoipa::path(
    post,
    path = "/projects/{repository_id}/mentors",
    params(("repository_id" = String, Path, description = "GitHub repository id")),
    responses(
        (status = 200, description = "Updated project", body = ProjectRecord),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn add_mentor(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(repository_id): Path<String>,
) -> Result<Json<ProjectRecord>, ApiError> {
    update_membership(&state, &repository_id, &user.id, Membership::Mentor, true)
        .await
        .map(Json)
}

/// Stop mentoring a project
#[utoipa::path(
    delete,
    path = "/projects/{repository_id}/mentors",
    params(("repository_id" = String, Path, description = "GitHub repository id")),
    responses(
        (status = 200, description = "Updated project", body = ProjectRecord),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn remove_mentor(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(repository_id): Path<String>,
) -> Result<Json<ProjectRecord>, ApiError> {
    update_membership(&state, &repository_id, &user.id, Membership::Mentor, false)
        .await
        .map(Json)
}

/// Register interest in a project
#[utoipa::path(
    post,
    path = "/projects/{repository_id}/interest",
    params(("repository_id" = String, Path, description = "GitHub repository id")),
    responses(
        (status = 200, description = "Updated project", body = ProjectRecord),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn add_interest(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(repository_id): Path<String>,
) -> Result<Json<ProjectRecord>, ApiError> {
    update_membership(&state, &repository_id, &user.id, Membership::Interested, true)
        .await
        .map(Json)
}

/// Withdraw interest in a project
#[utoipa::path(
    delete,
    path = "/projects/{repository_id}/interest",
    params(("repository_id" = String, Path, description = "GitHub repository id")),
    responses(
        (status = 200, description = "Updated project", body = ProjectRecord),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn remove_interest(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(repository_id): Path<String>,
) -> Result<Json<ProjectRecord>, ApiError> {
    update_membership(&state, &repository_id, &user.id, Membership::Interested, false)
        .await
        .map(Json)
}
