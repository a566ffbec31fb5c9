//! Staleness policy for GitHub-derived project data.
//!
//! A project caches its contributor count together with the time it was fetched.
//! The cache is refreshed at most once per `max_age`; the count and the timestamp
//! always move together, so a failed fetch leaves both untouched.

use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GitHubSyncConfig;
use crate::connectors::{ProviderError, RepositoryProvider};

/// Default maximum age of cached GitHub data: one hour, in milliseconds.
pub const MAX_GITHUB_SYNC_AGE: i64 = 3_600_000;

/// Returns true when data synced at `last_synced_at` must be refreshed at `now`.
///
/// All values are epoch milliseconds. Data that was never synced is always stale.
pub fn is_stale(last_synced_at: Option<i64>, now: i64, max_age: i64) -> bool {
    match last_synced_at {
        None => true,
        Some(synced_at) => now.saturating_sub(synced_at) >= max_age,
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// The GitHub-derived part of a project record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncState {
    pub num_contributors: Option<i32>,
    pub last_synced_at: Option<i64>,
}

/// A contributor fetch failed; the cached state was not modified.
#[derive(Debug, Clone, Error)]
#[error("GitHub sync failed for repository '{repository_id}': {source}")]
pub struct ExternalSyncFailed {
    pub repository_id: String,
    #[source]
    pub source: ProviderError,
}

/// Decides when to contact the provider and applies the result.
#[derive(Debug, Clone)]
pub struct GitHubSyncPolicy {
    enabled: bool,
    max_age_ms: i64,
    timeout: Duration,
}

impl GitHubSyncPolicy {
    pub fn new(enabled: bool, max_age: Duration, timeout: Duration) -> Self {
        Self {
            enabled,
            max_age_ms: i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX),
            timeout,
        }
    }

    pub fn from_config(config: &GitHubSyncConfig) -> Self {
        Self::new(config.enabled, config.max_age(), config.request_timeout())
    }

    /// A policy that never contacts the provider.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_age_ms: MAX_GITHUB_SYNC_AGE,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_age_ms(&self) -> i64 {
        self.max_age_ms
    }

    /// Oldest sync timestamp that is still considered fresh at `now`.
    pub fn stale_cutoff(&self, now: i64) -> i64 {
        now.saturating_sub(self.max_age_ms)
    }

    /// Refresh `state` from the provider if it is stale.
    ///
    /// Returns `Ok(true)` when a fetch happened and `state` was updated.
    pub async fn ensure_fresh(
        &self,
        state: &mut SyncState,
        repository_id: &str,
        provider: &dyn RepositoryProvider,
    ) -> Result<bool, ExternalSyncFailed> {
        if !self.enabled {
            return Ok(false);
        }

        if !is_stale(state.last_synced_at, now_millis(), self.max_age_ms) {
            debug!(repository_id, "GitHub data still fresh");
            return Ok(false);
        }

        self.sync(state, repository_id, provider).await?;
        Ok(true)
    }

    /// Fetch the contributor count regardless of staleness.
    ///
    /// Still a no-op when syncing is disabled.
    pub async fn sync(
        &self,
        state: &mut SyncState,
        repository_id: &str,
        provider: &dyn RepositoryProvider,
    ) -> Result<(), ExternalSyncFailed> {
        if !self.enabled {
            return Ok(());
        }

        let fail = |source: ProviderError| {
            counter!("github_sync_failure_total").increment(1);
            warn!(
                repository_id,
                provider = provider.slug(),
                error = %source,
                "GitHub sync failed; keeping cached data"
            );
            ExternalSyncFailed {
                repository_id: repository_id.to_string(),
                source,
            }
        };

        let count = tokio::time::timeout(self.timeout, provider.contributor_count(repository_id))
            .await
            .map_err(|_| {
                fail(ProviderError::transient(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                )))
            })?
            .map_err(fail)?;

        let num_contributors = i32::try_from(count).map_err(|_| {
            fail(ProviderError::malformed(format!(
                "contributor count {} out of range",
                count
            )))
        })?;

        *state = SyncState {
            num_contributors: Some(num_contributors),
            last_synced_at: Some(now_millis()),
        };

        counter!("github_sync_success_total").increment(1);
        info!(repository_id, num_contributors, "Synced project with GitHub");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::ExampleProvider;

    fn policy() -> GitHubSyncPolicy {
        GitHubSyncPolicy::new(
            true,
            Duration::from_millis(MAX_GITHUB_SYNC_AGE as u64),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn never_synced_is_always_stale() {
        for (now, max_age) in [(0, 0), (0, MAX_GITHUB_SYNC_AGE), (i64::MAX, i64::MAX)] {
            assert!(is_stale(None, now, max_age));
        }
    }

    #[test]
    fn staleness_boundary_is_inclusive() {
        let t = 1_700_000_000_000;
        assert!(!is_stale(Some(t), t, MAX_GITHUB_SYNC_AGE));
        assert!(!is_stale(Some(t), t + MAX_GITHUB_SYNC_AGE - 1, MAX_GITHUB_SYNC_AGE));
        assert!(is_stale(Some(t), t + MAX_GITHUB_SYNC_AGE, MAX_GITHUB_SYNC_AGE));
        assert!(is_stale(Some(t), t + MAX_GITHUB_SYNC_AGE + 1, MAX_GITHUB_SYNC_AGE));
    }

    #[test]
    fn zero_max_age_is_always_stale() {
        assert!(is_stale(Some(5), 5, 0));
    }

    #[test]
    fn future_timestamps_do_not_overflow() {
        assert!(!is_stale(Some(i64::MAX), i64::MIN, MAX_GITHUB_SYNC_AGE));
    }

    #[tokio::test]
    async fn ensure_fresh_fetches_once_in_quick_succession() {
        let provider = ExampleProvider::new().with_repository("7", 12);
        let policy = policy();
        let mut state = SyncState::default();

        assert!(policy.ensure_fresh(&mut state, "7", &provider).await.unwrap());
        assert!(!policy.ensure_fresh(&mut state, "7", &provider).await.unwrap());

        assert_eq!(provider.contributor_calls(), 1);
        assert_eq!(state.num_contributors, Some(12));
        let synced_at = state.last_synced_at.expect("timestamp set");
        assert!(!is_stale(Some(synced_at), now_millis(), policy.max_age_ms()));
    }

    #[tokio::test]
    async fn stale_state_is_refreshed() {
        let provider = ExampleProvider::new().with_repository("7", 3);
        let mut state = SyncState {
            num_contributors: Some(1),
            last_synced_at: Some(now_millis() - MAX_GITHUB_SYNC_AGE - 1),
        };

        assert!(policy().ensure_fresh(&mut state, "7", &provider).await.unwrap());
        assert_eq!(state.num_contributors, Some(3));
    }

    #[tokio::test]
    async fn fresh_state_is_left_alone() {
        let provider = ExampleProvider::new().with_repository("7", 3);
        let original = SyncState {
            num_contributors: Some(1),
            last_synced_at: Some(now_millis()),
        };
        let mut state = original;

        assert!(!policy().ensure_fresh(&mut state, "7", &provider).await.unwrap());
        assert_eq!(state, original);
        assert_eq!(provider.contributor_calls(), 0);
    }

    #[tokio::test]
    async fn failure_leaves_state_untouched() {
        let provider = ExampleProvider::new();
        provider.fail_with("7", ProviderError::transient("502 from upstream"));
        let original = SyncState {
            num_contributors: Some(4),
            last_synced_at: Some(1),
        };
        let mut state = original;

        let err = policy()
            .ensure_fresh(&mut state, "7", &provider)
            .await
            .unwrap_err();

        assert_eq!(err.repository_id, "7");
        assert!(err.source.is_retryable());
        assert_eq!(state, original);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = ExampleProvider::new().with_repository("7", 3);
        provider.stall("7", Duration::from_secs(2));
        let policy = GitHubSyncPolicy::new(
            true,
            Duration::from_secs(3600),
            Duration::from_millis(20),
        );
        let mut state = SyncState::default();

        let err = policy
            .ensure_fresh(&mut state, "7", &provider)
            .await
            .unwrap_err();

        assert!(matches!(err.source, ProviderError::Transient { .. }));
        assert_eq!(state, SyncState::default());
    }

    #[tokio::test]
    async fn disabled_policy_never_fetches() {
        let provider = ExampleProvider::new().with_repository("7", 3);
        let policy = GitHubSyncPolicy::disabled();
        let mut state = SyncState::default();

        assert!(!policy.ensure_fresh(&mut state, "7", &provider).await.unwrap());
        policy.sync(&mut state, "7", &provider).await.unwrap();

        assert_eq!(provider.contributor_calls(), 0);
        assert_eq!(state, SyncState::default());
    }

    #[test]
    fn stale_cutoff_subtracts_max_age() {
        assert_eq!(policy().stale_cutoff(10_000_000), 10_000_000 - MAX_GITHUB_SYNC_AGE);
    }
}
