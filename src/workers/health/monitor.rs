// Package health provides the latency-driven rotation trigger.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::control::Rotator;
use crate::metrics::RotationReason;
use crate::pool::{Pool, Worker};

use super::probe::LatencyProbe;

/// HealthMonitor probes every alive worker each tick and rotates the
/// circuit of any worker slower than the latency ceiling. It never marks
/// a worker dead and never restarts one.
pub struct HealthMonitor {
    shutdown_token: CancellationToken,
    pool: Arc<Pool>,
    probe: Arc<dyn LatencyProbe>,
    rotator: Arc<dyn Rotator>,
    interval: Duration,
    latency_ceiling: Duration,
}

impl HealthMonitor {
    pub fn new(
        shutdown_token: CancellationToken,
        pool: Arc<Pool>,
        probe: Arc<dyn LatencyProbe>,
        rotator: Arc<dyn Rotator>,
        interval: Duration,
        latency_ceiling: Duration,
    ) -> Self {
        Self {
            shutdown_token,
            pool,
            probe,
            rotator,
            interval,
            latency_ceiling,
        }
    }

    /// Ticks until the shutdown token fires.
    pub async fn run(&self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            component = "health",
            event = "started",
            interval = ?self.interval,
            latency_ceiling = ?self.latency_ceiling,
            "health monitor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!(component = "health", event = "stopped", "health monitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let rotated = self.tick().await;
                    debug!(component = "health", event = "tick", rotated, "health tick done");
                }
            }
        }
    }

    /// Probes all alive workers concurrently; returns how many were rotated.
    pub async fn tick(&self) -> usize {
        let checks = self
            .pool
            .workers()
            .iter()
            .filter(|w| w.is_alive())
            .map(|w| self.check(w));

        join_all(checks).await.into_iter().filter(|rotated| *rotated).count()
    }

    async fn check(&self, worker: &Worker) -> bool {
        let Some(latency) = self.probe.measure(worker.data_addr()).await else {
            // No data, not a verdict: keep the previous sample.
            return false;
        };
        worker.record_latency(latency);

        if latency <= self.latency_ceiling {
            return false;
        }

        warn!(
            component = "health",
            event = "latency_exceeded",
            worker = worker.id(),
            latency_ms = latency.as_millis() as u64,
            ceiling_ms = self.latency_ceiling.as_millis() as u64,
            "worker is slow, rotating circuit"
        );
        self.rotator.rotate(worker, RotationReason::Latency).await;
        true
    }
}
