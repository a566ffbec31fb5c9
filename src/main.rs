//! # OpenSesame API Main Entry Point
//!
//! `serve` (the default) runs the HTTP API together with the background GitHub
//! sweeper; `sweep` runs a single staleness sweep and exits.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use opensesame::{
    config::{AppConfig, ConfigLoader},
    connectors::{GitHubClient, RepositoryProvider},
    db,
    projects::GitHubSyncPolicy,
    repositories::ProjectRepository,
    server::{AppState, run_server},
    sweeper::{self, GitHubSyncSweeper},
    telemetry,
};

#[derive(Debug, Parser)]
#[command(name = "opensesame", version, about = "OpenSesame project-matching service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API and run the background sweeper
    Serve,
    /// Refresh stale projects once and print the report
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(
        ConfigLoader::new()
            .load()
            .context("loading configuration")?,
    );
    telemetry::init_tracing(&config).context("initializing telemetry")?;

    if let Ok(redacted_json) = config.redacted_json() {
        tracing::info!(profile = %config.profile, config = %redacted_json, "Loaded configuration");
    }

    let db = db::init_pool(&config).await?;
    db::migrate(&db).await?;

    let provider: Arc<dyn RepositoryProvider> =
        Arc::new(GitHubClient::from_config(&config).context("building GitHub client")?);
    let projects = ProjectRepository::new(
        Arc::new(db.clone()),
        provider,
        GitHubSyncPolicy::from_config(&config.github),
    )
    .with_sweep_concurrency(config.github.sweep_concurrency as usize);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db, projects).await,
        Command::Sweep => {
            let report = projects.refresh_stale().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(
    config: Arc<AppConfig>,
    db: sea_orm::DatabaseConnection,
    projects: ProjectRepository,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let sweeper_task = if config.github.enabled {
        let sweeper = GitHubSyncSweeper::from_config(projects.clone(), &config.github);
        Some(tokio::spawn(sweeper.run(shutdown.clone())))
    } else {
        tracing::info!("GitHub sync disabled; background sweeper not started");
        None
    };

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                signal.cancel();
            }
            Err(err) => tracing::error!(error = %err, "Failed to listen for shutdown signal"),
        }
    });

    let state = AppState {
        config: Arc::clone(&config),
        db,
        projects,
    };
    let result = run_server(config, state, shutdown.clone()).await;

    shutdown.cancel();
    if let Some(handle) = sweeper_task {
        sweeper::join(handle).await;
    }
    result
}
