//! Repository provider trait definition
//!
//! Defines the interface the project core needs from a repository-metadata source.
//! The production implementation talks to the GitHub REST API; tests substitute
//! in-memory stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Errors a provider can report, classified so callers can decide how to react
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The repository does not exist or is not visible to us
    #[error("repository '{repository_id}' not found")]
    NotFound { repository_id: String },

    /// The provider asked us to slow down
    #[error("rate limited by provider (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// Credentials were rejected
    #[error("provider rejected credentials: {details}")]
    Unauthorized { details: String },

    /// Network failures, timeouts and 5xx responses
    #[error("transient provider failure: {details}")]
    Transient { details: String },

    /// The provider answered with something we could not understand
    #[error("malformed provider response: {details}")]
    Malformed { details: String },
}

impl ProviderError {
    pub fn transient<S: Into<String>>(details: S) -> Self {
        Self::Transient {
            details: details.into(),
        }
    }

    pub fn malformed<S: Into<String>>(details: S) -> Self {
        Self::Malformed {
            details: details.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying the same call later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }
}

/// Summary of a repository as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RepositorySummary {
    /// Numeric repository id
    #[schema(example = 1296269)]
    pub id: u64,
    /// Short repository name
    #[schema(example = "Hello-World")]
    pub name: String,
    /// Owner-qualified repository name
    #[schema(example = "octocat/Hello-World")]
    pub full_name: String,
    /// Browser URL of the repository
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Source of repository metadata
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Short provider identifier used in logs and error details
    fn slug(&self) -> &'static str;

    /// Look up a repository by id
    async fn repository(&self, repository_id: &str) -> Result<RepositorySummary, ProviderError>;

    /// Count every contributor of a repository
    async fn contributor_count(&self, repository_id: &str) -> Result<u32, ProviderError>;
}
