//! # OpenSesame API Library
//!
//! Core functionality for the OpenSesame project-matching service: project
//! filtering, GitHub-backed project records, storage, and the HTTP surface.

pub mod auth;
pub mod config;
pub mod connectors;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod projects;
pub mod repositories;
pub mod server;
pub mod sweeper;
pub mod telemetry;
pub use migration;
