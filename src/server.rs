//! # Server Configuration
//!
//! This module contains the server setup and configuration for the OpenSesame API.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::operator_auth;
use crate::config::AppConfig;
use crate::handlers;
use crate::repositories::ProjectRepository;
use crate::telemetry::trace_context_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub projects: ProjectRepository,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/admin/projects/refresh",
            post(handlers::admin::refresh_projects),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            operator_auth,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/auth", get(handlers::auth::auth_status))
        .route("/projects", get(handlers::projects::list_projects))
        .route(
            "/projects/{repository_id}",
            get(handlers::projects::get_project),
        )
        .route(
            "/projects/{repository_id}/github",
            get(handlers::projects::get_repository),
        )
        .route(
            "/projects/{repository_id}/mentors",
            post(handlers::projects::add_mentor).delete(handlers::projects::remove_mentor),
        )
        .route(
            "/projects/{repository_id}/interest",
            post(handlers::projects::add_interest).delete(handlers::projects::remove_interest),
        )
        .merge(admin)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Starts the server and serves until `shutdown` fires
pub async fn run_server(
    config: Arc<AppConfig>,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Registers the operator bearer scheme
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("Operator token"))
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::auth::auth_status,
        crate::handlers::projects::list_projects,
        crate::handlers::projects::get_project,
        crate::handlers::projects::get_repository,
        crate::handlers::projects::add_mentor,
        crate::handlers::projects::remove_mentor,
        crate::handlers::projects::add_interest,
        crate::handlers::projects::remove_interest,
        crate::handlers::admin::refresh_projects,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::handlers::auth::AuthStatus,
            crate::auth::UserIdentity,
            crate::projects::ProjectRecord,
            crate::connectors::RepositorySummary,
            crate::repositories::SweepReport,
            crate::repositories::SweepFailure,
            crate::error::ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "OpenSesame API",
        description = "Match open-source projects with mentors and interested contributors",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
