//! Test utilities for database testing.
//!
//! This module provides utilities for setting up in-memory SQLite databases
//! with migrations applied, inserting raw project rows, and wiring a
//! `ProjectRepository` to an in-memory GitHub provider.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use opensesame::config::AppConfig;
use opensesame::connectors::ExampleProvider;
use opensesame::models::project;
use opensesame::projects::GitHubSyncPolicy;
use opensesame::repositories::ProjectRepository;
use opensesame::server::AppState;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value as JsonValue;

pub const OPERATOR_TOKEN: &str = "test-operator-token";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Sync policy with the default one-hour max age and a short fetch timeout.
pub fn test_policy() -> GitHubSyncPolicy {
    GitHubSyncPolicy::new(true, Duration::from_secs(3600), Duration::from_millis(500))
}

/// Builds a repository over `db` backed by `provider`.
pub fn project_repository(
    db: &DatabaseConnection,
    provider: Arc<ExampleProvider>,
) -> ProjectRepository {
    ProjectRepository::new(Arc::new(db.clone()), provider, test_policy())
}

/// Builds application state suitable for driving the router in tests.
pub fn test_state(db: &DatabaseConnection, provider: Arc<ExampleProvider>) -> AppState {
    let config = AppConfig {
        profile: "test".to_string(),
        operator_tokens: vec![OPERATOR_TOKEN.to_string()],
        ..Default::default()
    };

    AppState {
        config: Arc::new(config),
        db: db.clone(),
        projects: project_repository(db, provider),
    }
}

/// A project row as it might exist in storage, bypassing the record lifecycle.
pub struct RawProject {
    pub repository_id: String,
    pub mentor_ids: Option<JsonValue>,
    pub interested_user_ids: Option<JsonValue>,
    pub num_mentors: i32,
    pub num_interested_users: i32,
    pub num_contributors: Option<i32>,
    pub time_synced_with_github: Option<i64>,
}

impl RawProject {
    pub fn new(repository_id: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            mentor_ids: None,
            interested_user_ids: None,
            num_mentors: 0,
            num_interested_users: 0,
            num_contributors: None,
            time_synced_with_github: None,
        }
    }

    /// Marks the row as synced `age_ms` milliseconds ago with `contributors`.
    pub fn synced(mut self, contributors: i32, age_ms: i64) -> Self {
        self.num_contributors = Some(contributors);
        self.time_synced_with_github = Some(Utc::now().timestamp_millis() - age_ms);
        self
    }

    pub fn mentors(mut self, ids: &[&str]) -> Self {
        self.num_mentors = ids.len() as i32;
        self.mentor_ids = Some(serde_json::json!(ids));
        self
    }

    pub fn interested(mut self, ids: &[&str]) -> Self {
        self.num_interested_users = ids.len() as i32;
        self.interested_user_ids = Some(serde_json::json!(ids));
        self
    }

    pub async fn insert(self, db: &DatabaseConnection) -> Result<project::Model> {
        let now = Utc::now().into();
        let model = project::ActiveModel {
            repository_id: Set(self.repository_id),
            mentor_ids: Set(self.mentor_ids),
            interested_user_ids: Set(self.interested_user_ids),
            num_mentors: Set(self.num_mentors),
            num_interested_users: Set(self.num_interested_users),
            num_contributors: Set(self.num_contributors),
            time_synced_with_github: Set(self.time_synced_with_github),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        Ok(model)
    }
}

/// One hour and one millisecond: just past the default max age.
pub const STALE_AGE_MS: i64 = 3_600_001;
