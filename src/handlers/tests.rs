//! # Tests for Handlers
//!
//! Unit tests for the service-level handlers.

use std::sync::Arc;

use axum::{extract::State, response::Json};
use sea_orm::Database;
use serde_json::Value;

use crate::config::AppConfig;
use crate::connectors::ExampleProvider;
use crate::handlers::{healthz, root};
use crate::models::ServiceInfo;
use crate::projects::GitHubSyncPolicy;
use crate::repositories::ProjectRepository;
use crate::server::AppState;

async fn sqlite_state() -> AppState {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite connects");
    let projects = ProjectRepository::new(
        Arc::new(db.clone()),
        Arc::new(ExampleProvider::new()),
        GitHubSyncPolicy::disabled(),
    );
    AppState {
        config: Arc::new(AppConfig::default()),
        db,
        projects,
    }
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let Json(service_info) = root().await;

    assert_eq!(service_info.service, "opensesame");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_root_handler_returns_valid_json() {
    let Json(service_info) = root().await;

    let json_value: Value =
        serde_json::to_value(&service_info).expect("Failed to serialize ServiceInfo");

    assert_eq!(json_value["service"], "opensesame");
    assert!(json_value.get("version").is_some());
}

#[test]
fn test_service_info_default() {
    let service_info = ServiceInfo::default();
    assert_eq!(service_info.service, "opensesame");
}

#[tokio::test]
async fn test_healthz_reports_ok_when_database_answers() {
    let state = sqlite_state().await;

    let Json(status) = healthz(State(state)).await.expect("healthy database");

    assert_eq!(status.status, "ok");
}
