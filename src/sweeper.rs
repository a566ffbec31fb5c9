//! # GitHub Sync Sweeper
//!
//! Background task that periodically refreshes every project whose cached GitHub
//! data has gone stale. Each tick runs [`ProjectRepository::refresh_stale`]; a
//! failing tick is logged and the loop carries on until shutdown.

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::config::GitHubSyncConfig;
use crate::repositories::project::{ProjectRepository, Result, SweepReport};

/// Background sweep service.
pub struct GitHubSyncSweeper {
    repository: ProjectRepository,
    interval: Duration,
}

impl GitHubSyncSweeper {
    pub fn new(repository: ProjectRepository, interval: Duration) -> Self {
        Self {
            repository,
            interval,
        }
    }

    pub fn from_config(repository: ProjectRepository, config: &GitHubSyncConfig) -> Self {
        Self::new(
            repository,
            Duration::from_secs(config.sweep_interval_seconds),
        )
    }

    /// Run the sweep loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_seconds = self.interval.as_secs(),
            "Starting GitHub sync sweeper"
        );

        loop {
            let delay = jittered(self.interval);
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("GitHub sync sweeper shutdown requested");
                    break;
                }
                _ = sleep(delay) => {
                    if let Err(err) = self.tick().await {
                        error!(error = ?err, "GitHub sweep tick failed");
                    }
                }
            }
        }

        info!("GitHub sync sweeper stopped");
    }

    /// Execute one sweep and record its metrics.
    pub async fn tick(&self) -> Result<SweepReport> {
        let started = Instant::now();
        let result = self.repository.refresh_stale().await;
        histogram!("github_sweep_tick_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1_000.0);

        let report = result?;
        gauge!("github_sweep_examined_gauge").set(report.examined as f64);
        counter!("github_sweep_refreshed_total").increment(report.refreshed as u64);
        counter!("github_sweep_failed_total").increment(report.failures.len() as u64);
        Ok(report)
    }
}

/// Wait for a spawned sweeper to stop. Returns false if the task panicked or was aborted.
pub async fn join(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(err) => {
            error!(error = ?err, "GitHub sync sweeper task panicked or was cancelled");
            false
        }
    }
}

/// Spread ticks of several instances apart by up to 10% of the interval.
fn jittered(interval: Duration) -> Duration {
    let max_jitter_ms = (interval.as_millis() / 10) as u64;
    if max_jitter_ms == 0 {
        return interval;
    }
    interval + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_ten_percent() {
        let interval = Duration::from_secs(300);
        for _ in 0..100 {
            let delay = jittered(interval);
            assert!(delay >= interval);
            assert!(delay <= interval + Duration::from_secs(30));
        }
    }

    #[tokio::test]
    async fn join_reports_a_panicked_sweeper() {
        let handle = tokio::spawn(async { panic!("sweep exploded") });
        assert!(!join(handle).await);

        let handle = tokio::spawn(async {});
        assert!(join(handle).await);
    }

    #[test]
    fn tiny_intervals_are_not_jittered() {
        let interval = Duration::from_millis(5);
        assert_eq!(jittered(interval), interval);
    }
}
