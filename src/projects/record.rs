//! Project record lifecycle
//!
//! [`ProjectRecord`] is the in-memory form of a row in `projects`. Records are either
//! created fresh, which syncs with GitHub immediately, or rehydrated from storage,
//! which syncs only when the cached data is stale. Derived counts are recomputed
//! every time a record is turned back into an active model for persisting.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;
use utoipa::ToSchema;

use crate::connectors::RepositoryProvider;
use crate::models::project;
use crate::projects::sync::{ExternalSyncFailed, GitHubSyncPolicy, SyncState};

/// A project as served to callers
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    /// GitHub repository id
    #[schema(example = "1296269")]
    pub repository_id: String,
    pub mentor_ids: Vec<String>,
    pub interested_user_ids: Vec<String>,
    pub num_mentors: i32,
    pub num_interested_users: i32,
    /// `null` until the first successful GitHub sync
    pub num_contributors: Option<i32>,
    /// Epoch milliseconds of the last successful GitHub sync
    #[serde(rename = "timeSyncedWithGitHub")]
    pub time_synced_with_github: Option<i64>,
    #[serde(skip)]
    created_at: Option<DateTimeWithTimeZone>,
}

impl ProjectRecord {
    /// Build a new record and sync it with GitHub before handing it out.
    pub async fn create(
        repository_id: &str,
        mentor_ids: Vec<String>,
        interested_user_ids: Vec<String>,
        policy: &GitHubSyncPolicy,
        provider: &dyn RepositoryProvider,
    ) -> Result<Self, ExternalSyncFailed> {
        let mut record = Self {
            repository_id: repository_id.to_string(),
            num_mentors: count(&mentor_ids),
            num_interested_users: count(&interested_user_ids),
            mentor_ids,
            interested_user_ids,
            num_contributors: None,
            time_synced_with_github: None,
            created_at: None,
        };

        let mut state = record.sync_state();
        policy.sync(&mut state, repository_id, provider).await?;
        record.apply_sync_state(state);
        Ok(record)
    }

    /// Turn a stored row into a record, refreshing GitHub data if it is stale.
    pub async fn rehydrate(
        model: project::Model,
        policy: &GitHubSyncPolicy,
        provider: &dyn RepositoryProvider,
    ) -> Result<Self, ExternalSyncFailed> {
        let mut record = Self::from_model(model);
        record.ensure_fresh(policy, provider).await?;
        Ok(record)
    }

    /// Convert a stored row without contacting the provider.
    ///
    /// NULL or unreadable membership lists become empty lists.
    pub fn from_model(model: project::Model) -> Self {
        let mentor_ids = decode_ids(&model.repository_id, "mentor_ids", model.mentor_ids);
        let interested_user_ids = decode_ids(
            &model.repository_id,
            "interested_user_ids",
            model.interested_user_ids,
        );

        Self {
            repository_id: model.repository_id,
            mentor_ids,
            interested_user_ids,
            num_mentors: model.num_mentors,
            num_interested_users: model.num_interested_users,
            num_contributors: model.num_contributors,
            time_synced_with_github: model.time_synced_with_github,
            created_at: Some(model.created_at),
        }
    }

    /// Refresh GitHub data if stale. Returns whether a fetch happened.
    pub async fn ensure_fresh(
        &mut self,
        policy: &GitHubSyncPolicy,
        provider: &dyn RepositoryProvider,
    ) -> Result<bool, ExternalSyncFailed> {
        let mut state = self.sync_state();
        let refreshed = policy
            .ensure_fresh(&mut state, &self.repository_id, provider)
            .await?;
        self.apply_sync_state(state);
        Ok(refreshed)
    }

    pub fn sync_state(&self) -> SyncState {
        SyncState {
            num_contributors: self.num_contributors,
            last_synced_at: self.time_synced_with_github,
        }
    }

    fn apply_sync_state(&mut self, state: SyncState) {
        self.num_contributors = state.num_contributors;
        self.time_synced_with_github = state.last_synced_at;
    }

    /// Recompute the derived membership counts from the lists.
    pub fn prepare_for_save(&mut self) {
        self.num_mentors = count(&self.mentor_ids);
        self.num_interested_users = count(&self.interested_user_ids);
    }

    /// Build the active model to persist, recomputing derived counts first.
    pub fn into_active_model(mut self) -> project::ActiveModel {
        self.prepare_for_save();
        let now: DateTimeWithTimeZone = Utc::now().into();

        project::ActiveModel {
            repository_id: Set(self.repository_id),
            mentor_ids: Set(Some(JsonValue::from(self.mentor_ids))),
            interested_user_ids: Set(Some(JsonValue::from(self.interested_user_ids))),
            num_mentors: Set(self.num_mentors),
            num_interested_users: Set(self.num_interested_users),
            num_contributors: Set(self.num_contributors),
            time_synced_with_github: Set(self.time_synced_with_github),
            created_at: Set(self.created_at.unwrap_or(now)),
            updated_at: Set(now),
        }
    }

    /// Add a mentor. Returns false if the user already mentors this project.
    pub fn add_mentor(&mut self, user_id: &str) -> bool {
        add_unique(&mut self.mentor_ids, user_id)
    }

    pub fn remove_mentor(&mut self, user_id: &str) -> bool {
        remove_all(&mut self.mentor_ids, user_id)
    }

    /// Add an interested user. Returns false if already present.
    pub fn add_interested_user(&mut self, user_id: &str) -> bool {
        add_unique(&mut self.interested_user_ids, user_id)
    }

    pub fn remove_interested_user(&mut self, user_id: &str) -> bool {
        remove_all(&mut self.interested_user_ids, user_id)
    }
}

fn count(ids: &[String]) -> i32 {
    i32::try_from(ids.len()).unwrap_or(i32::MAX)
}

fn add_unique(ids: &mut Vec<String>, user_id: &str) -> bool {
    if ids.iter().any(|id| id == user_id) {
        return false;
    }
    ids.push(user_id.to_string());
    true
}

fn remove_all(ids: &mut Vec<String>, user_id: &str) -> bool {
    let before = ids.len();
    ids.retain(|id| id != user_id);
    ids.len() != before
}

fn decode_ids(repository_id: &str, column: &str, value: Option<JsonValue>) -> Vec<String> {
    match value {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(repository_id, column, error = %e, "Ignoring unreadable id list");
            Vec::new()
        }),
    }
}
