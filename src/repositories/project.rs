//! Project repository for database operations
//!
//! This module provides the ProjectRepository struct which encapsulates SeaORM
//! operations for the projects table. Every load path rehydrates rows through
//! [`ProjectRecord::rehydrate`], so callers only ever see records whose GitHub data
//! is fresh. Concurrent loads of the same stale project may both fetch and write;
//! the last write wins.

use std::sync::Arc;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, Iterable, QueryFilter as _,
    QueryOrder,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::connectors::RepositoryProvider;
use crate::models::project::{self, Entity as Project};
use crate::projects::filter::QueryFilter;
use crate::projects::record::ProjectRecord;
use crate::projects::sync::{ExternalSyncFailed, GitHubSyncPolicy, now_millis};

/// Default number of projects refreshed in parallel by the sweep
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;

/// Bind parameters allowed in one upsert statement (SQLite's historical cap is 999)
const MAX_BIND_PARAMS: usize = 900;

#[derive(Debug, Error)]
pub enum ProjectRepositoryError {
    #[error(transparent)]
    Database(#[from] DbErr),

    #[error(transparent)]
    Sync(#[from] ExternalSyncFailed),

    #[error("sweep worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, ProjectRepositoryError>;

/// A project the sweep could not refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepFailure {
    pub repository_id: String,
    pub reason: String,
}

/// Outcome of one staleness sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Projects selected as stale or never synced
    pub examined: usize,
    /// Projects refreshed and written back
    pub refreshed: usize,
    /// Projects skipped because their sync failed
    pub failures: Vec<SweepFailure>,
}

/// Repository for project database operations
#[derive(Clone)]
pub struct ProjectRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    provider: Arc<dyn RepositoryProvider>,
    policy: GitHubSyncPolicy,
    sweep_concurrency: usize,
}

impl ProjectRepository {
    pub fn new(
        db: Arc<DatabaseConnection>,
        provider: Arc<dyn RepositoryProvider>,
        policy: GitHubSyncPolicy,
    ) -> Self {
        Self {
            db,
            provider,
            policy,
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }

    /// Limit how many projects the sweep refreshes at once (minimum 1).
    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweep_concurrency = concurrency.max(1);
        self
    }

    pub fn provider(&self) -> &Arc<dyn RepositoryProvider> {
        &self.provider
    }

    pub fn policy(&self) -> &GitHubSyncPolicy {
        &self.policy
    }

    /// Finds a project by repository id, refreshing stale GitHub data first.
    pub async fn find_by_id(&self, repository_id: &str) -> Result<Option<ProjectRecord>> {
        let Some(model) = Project::find_by_id(repository_id.to_string())
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let record = self.load(model).await?;
        Ok(Some(record))
    }

    /// Loads a project, or creates and stores a new one with empty lists.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, repository_id: &str) -> Result<ProjectRecord> {
        if let Some(record) = self.find_by_id(repository_id).await? {
            return Ok(record);
        }

        let mut record = ProjectRecord::create(
            repository_id,
            Vec::new(),
            Vec::new(),
            &self.policy,
            self.provider.as_ref(),
        )
        .await?;
        self.save(&mut record).await?;

        info!(repository_id, "Created project");
        Ok(record)
    }

    /// Returns every project matching all `filters`, each freshly loaded.
    pub async fn query(&self, filters: &[QueryFilter]) -> Result<Vec<ProjectRecord>> {
        let mut select = Project::find();
        for filter in filters {
            select = select.filter(filter.to_expr());
        }

        let models = select
            .order_by_asc(project::Column::RepositoryId)
            .all(&*self.db)
            .await?;

        debug!(
            filters = filters.len(),
            matches = models.len(),
            "Queried projects"
        );

        let mut records = Vec::with_capacity(models.len());
        let mut refreshed = Vec::new();
        for model in models {
            let synced_before = model.time_synced_with_github;
            let record =
                ProjectRecord::rehydrate(model, &self.policy, self.provider.as_ref()).await?;
            if record.time_synced_with_github != synced_before {
                refreshed.push(record.clone());
            }
            records.push(record);
        }

        self.save_all(&refreshed).await?;
        Ok(records)
    }

    /// Persists one record, recomputing its derived counts.
    pub async fn save(&self, record: &mut ProjectRecord) -> Result<()> {
        record.prepare_for_save();
        self.save_all(std::slice::from_ref(record)).await
    }

    /// Upserts all records, one statement per chunk of [`save_batch_size`] rows.
    ///
    /// Chunks are written in order; an error stops the write and earlier chunks stay
    /// persisted.
    pub async fn save_all(&self, records: &[ProjectRecord]) -> Result<()> {
        for chunk in records.chunks(save_batch_size()) {
            let models = chunk.iter().cloned().map(ProjectRecord::into_active_model);
            Project::insert_many(models)
                .on_conflict(
                    OnConflict::column(project::Column::RepositoryId)
                        .update_columns([
                            project::Column::MentorIds,
                            project::Column::InterestedUserIds,
                            project::Column::NumMentors,
                            project::Column::NumInterestedUsers,
                            project::Column::NumContributors,
                            project::Column::TimeSyncedWithGithub,
                            project::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&*self.db)
                .await?;

            debug!(count = chunk.len(), "Saved projects");
        }
        Ok(())
    }

    /// Deletes a project. Returns false if it did not exist.
    pub async fn delete(&self, repository_id: &str) -> Result<bool> {
        let result = Project::delete_by_id(repository_id.to_string())
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Refreshes every stale or never-synced project.
    ///
    /// A failed sync skips that project and is reported; successfully refreshed
    /// projects are written back through [`Self::save_all`].
    #[instrument(skip_all)]
    pub async fn refresh_stale(&self) -> Result<SweepReport> {
        if !self.policy.is_enabled() {
            debug!("GitHub sync disabled; skipping sweep");
            return Ok(SweepReport::default());
        }

        let cutoff = self.policy.stale_cutoff(now_millis());
        let stale = Project::find()
            .filter(
                Condition::any()
                    .add(project::Column::TimeSyncedWithGithub.is_null())
                    .add(project::Column::TimeSyncedWithGithub.lte(cutoff)),
            )
            .order_by_asc(project::Column::TimeSyncedWithGithub)
            .all(&*self.db)
            .await?;

        let mut report = SweepReport {
            examined: stale.len(),
            ..Default::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.sweep_concurrency));
        let mut handles = Vec::with_capacity(stale.len());

        for model in stale {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ProjectRepositoryError::Worker(e.to_string()))?;
            let provider = self.provider.clone();
            let policy = self.policy.clone();
            let repository_id = model.repository_id.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let mut record = ProjectRecord::from_model(model);
                let refreshed = record.ensure_fresh(&policy, provider.as_ref()).await?;
                Ok::<_, ExternalSyncFailed>((record, refreshed))
            });
            handles.push((repository_id, handle));
        }

        let mut refreshed = Vec::new();
        for (repository_id, handle) in handles {
            match handle.await {
                Ok(Ok((record, true))) => refreshed.push(record),
                Ok(Ok((_, false))) => {}
                Ok(Err(e)) => report.failures.push(SweepFailure {
                    repository_id,
                    reason: e.source.to_string(),
                }),
                Err(e) => {
                    error!(repository_id, error = ?e, "Sweep task panicked or was cancelled");
                    report.failures.push(SweepFailure {
                        repository_id,
                        reason: "refresh task aborted".to_string(),
                    });
                }
            }
        }

        self.save_all(&refreshed).await?;
        report.refreshed = refreshed.len();

        if !report.failures.is_empty() {
            warn!(
                failed = report.failures.len(),
                "Some projects could not be synced with GitHub"
            );
        }
        info!(
            examined = report.examined,
            refreshed = report.refreshed,
            failed = report.failures.len(),
            "GitHub sweep completed"
        );
        Ok(report)
    }

    async fn load(&self, model: project::Model) -> Result<ProjectRecord> {
        let synced_before = model.time_synced_with_github;
        let mut record =
            ProjectRecord::rehydrate(model, &self.policy, self.provider.as_ref()).await?;
        if record.time_synced_with_github != synced_before {
            self.save(&mut record).await?;
        }
        Ok(record)
    }
}

/// Rows per upsert so that one statement stays under [`MAX_BIND_PARAMS`].
fn save_batch_size() -> usize {
    (MAX_BIND_PARAMS / project::Column::iter().count()).max(1)
}
