//! In-memory repository provider
//!
//! A stub provider backed by a map of repositories. Useful for local development
//! without GitHub access and as the provider double in tests: it records how many
//! contributor lookups were made and can be told to fail or stall for a repository.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::connectors::trait_::{ProviderError, RepositoryProvider, RepositorySummary};

#[derive(Debug, Default)]
struct ExampleState {
    contributors: HashMap<String, u32>,
    failures: HashMap<String, ProviderError>,
    delays: HashMap<String, Duration>,
}

/// Example stub provider
#[derive(Debug, Default)]
pub struct ExampleProvider {
    state: Mutex<ExampleState>,
    contributor_calls: AtomicUsize,
}

impl ExampleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository with the given contributor count.
    pub fn with_repository(self, repository_id: &str, contributors: u32) -> Self {
        self.set_contributors(repository_id, contributors);
        self
    }

    pub fn set_contributors(&self, repository_id: &str, contributors: u32) {
        let mut state = self.lock();
        state.failures.remove(repository_id);
        state
            .contributors
            .insert(repository_id.to_string(), contributors);
    }

    /// Make every lookup for `repository_id` fail with `error`.
    pub fn fail_with(&self, repository_id: &str, error: ProviderError) {
        self.lock()
            .failures
            .insert(repository_id.to_string(), error);
    }

    /// Delay contributor lookups for `repository_id`.
    pub fn stall(&self, repository_id: &str, delay: Duration) {
        self.lock().delays.insert(repository_id.to_string(), delay);
    }

    /// Number of contributor lookups performed so far.
    pub fn contributor_calls(&self) -> usize {
        self.contributor_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, ExampleState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn lookup(&self, repository_id: &str) -> Result<u32, ProviderError> {
        let state = self.lock();
        if let Some(error) = state.failures.get(repository_id) {
            return Err(error.clone());
        }
        state
            .contributors
            .get(repository_id)
            .copied()
            .ok_or_else(|| ProviderError::NotFound {
                repository_id: repository_id.to_string(),
            })
    }
}

#[async_trait]
impl RepositoryProvider for ExampleProvider {
    fn slug(&self) -> &'static str {
        "example"
    }

    async fn repository(&self, repository_id: &str) -> Result<RepositorySummary, ProviderError> {
        self.lookup(repository_id)?;
        Ok(RepositorySummary {
            id: repository_id.parse().unwrap_or_default(),
            name: format!("repo-{}", repository_id),
            full_name: format!("example/repo-{}", repository_id),
            html_url: format!("https://example.com/example/repo-{}", repository_id),
            description: None,
        })
    }

    async fn contributor_count(&self, repository_id: &str) -> Result<u32, ProviderError> {
        self.contributor_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.lock().delays.get(repository_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.lookup(repository_id)
    }
}
