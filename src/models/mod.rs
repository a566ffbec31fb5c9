//! # Data Models
//!
//! This module contains all the data models used throughout the projects service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod project;

pub use project::Entity as Project;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "opensesame".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
