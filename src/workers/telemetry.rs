// Package workers provides periodic pool telemetry.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::metrics;
use crate::metrics_runtime;
use crate::pool::Pool;

/// Totals over the whole pool at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub workers: usize,
    pub alive: usize,
    pub sessions: usize,
    pub restarts: u64,
    pub rotations: u64,
}

pub fn summarize(pool: &Pool) -> PoolSummary {
    let workers = pool.workers();
    PoolSummary {
        workers: workers.len(),
        alive: workers.iter().filter(|w| w.is_alive()).count(),
        sessions: workers.iter().map(|w| w.conn_count()).sum(),
        restarts: workers.iter().map(|w| w.restarts()).sum(),
        rotations: workers.iter().map(|w| w.rotations()).sum(),
    }
}

/// Telemetry logger for the pool.
pub async fn logger(shutdown_token: CancellationToken, pool: Arc<Pool>, each: Duration) {
    let mut ticker = interval(each);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => {
                tracing::debug!(svc = "telemetry", "logger stopped");
                return;
            }
            _ = ticker.tick() => {
                let summary = summarize(&pool);
                metrics::set_workers_total(summary.workers);
                metrics::set_workers_alive(summary.alive);
                metrics_runtime::run_upkeep_periodically();

                tracing::info!(
                    workers = summary.workers,
                    alive = summary.alive,
                    sessions = summary.sessions,
                    restarts = summary.restarts,
                    rotations = summary.rotations,
                    "pool stats"
                );
            }
        }
    }
}
