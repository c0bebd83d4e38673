// Package rotation provides the fixed-interval circuit rotation.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::control::Rotator;
use crate::metrics::RotationReason;
use crate::pool::Pool;

/// RotationScheduler rotates every worker once per interval regardless of
/// health or load. The first round happens one interval after start.
pub struct RotationScheduler {
    shutdown_token: CancellationToken,
    pool: Arc<Pool>,
    rotator: Arc<dyn Rotator>,
    interval: Duration,
}

impl RotationScheduler {
    pub fn new(
        shutdown_token: CancellationToken,
        pool: Arc<Pool>,
        rotator: Arc<dyn Rotator>,
        interval: Duration,
    ) -> Self {
        Self {
            shutdown_token,
            pool,
            rotator,
            interval,
        }
    }

    /// Ticks until the shutdown token fires; no final round is sent.
    pub async fn run(&self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            component = "rotation",
            event = "started",
            interval = %humantime::format_duration(self.interval),
            "rotation scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!(component = "rotation", event = "stopped", "rotation scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.rotate_all().await;
                }
            }
        }
    }

    /// Sends one rotation directive to every worker in the pool.
    pub async fn rotate_all(&self) {
        join_all(
            self.pool
                .workers()
                .iter()
                .map(|w| self.rotator.rotate(w, RotationReason::Scheduled)),
        )
        .await;

        info!(
            component = "rotation",
            event = "round_done",
            workers = self.pool.len(),
            "scheduled rotation round done"
        );
    }
}
