// Admin server wiring for the pool application.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::control::Rotator;
use crate::controller;
use crate::http::{Controller, HttpServer};
use crate::liveness::Prober;
use crate::pool::Pool;

/// Builds the admin server with every controller mounted.
pub fn make_http_server(
    shutdown_token: CancellationToken,
    cfg: &Config,
    pool: Arc<Pool>,
    rotator: Arc<dyn Rotator>,
    probe: Arc<dyn Prober>,
) -> Arc<HttpServer> {
    HttpServer::new(shutdown_token, cfg.clone(), controllers(cfg, pool, rotator, probe))
}

fn controllers(
    cfg: &Config,
    pool: Arc<Pool>,
    rotator: Arc<dyn Rotator>,
    probe: Arc<dyn Prober>,
) -> Vec<Box<dyn Controller>> {
    vec![
        // Healthcheck probe endpoint
        Box::new(controller::LivenessProbeController::new(probe)),
        // Metrics endpoint
        Box::new(controller::PrometheusMetricsController::new()),
        // Per-worker snapshot
        Box::new(controller::WorkersController::new(pool.clone())),
        // On-demand rotation of one or all workers
        Box::new(controller::RotateController::new(pool, rotator)),
        // Encodes and shows current config as json
        Box::new(controller::ShowConfigController::new(cfg.clone())),
    ]
}
