//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for database
//! entities and apply the project lifecycle on every load and save.

pub mod project;

pub use project::{
    ProjectRepository, ProjectRepositoryError, SweepFailure, SweepReport,
    DEFAULT_SWEEP_CONCURRENCY,
};
