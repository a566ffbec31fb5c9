//! Connectors module
//!
//! External repository-metadata providers:
//! - The `RepositoryProvider` trait the project core depends on
//! - The GitHub REST implementation
//! - An in-memory example provider for local runs and tests

pub mod example;
pub mod github;
pub mod trait_;

pub use example::ExampleProvider;
pub use github::{GITHUB_PROVIDER_SLUG, GitHubClient};
pub use trait_::{ProviderError, RepositoryProvider, RepositorySummary};
