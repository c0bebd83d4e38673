// Package api provides the worker snapshot controller.

use axum::{routing::get, Json, Router};
use std::sync::Arc;

use crate::http::Controller;
use crate::pool::{Pool, WorkerStats};

pub const WORKERS_PATH: &str = "/torpool/workers";

/// WorkersController exposes a point-in-time view of every worker.
pub struct WorkersController {
    pool: Arc<Pool>,
}

impl WorkersController {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }
}

impl Controller for WorkersController {
    fn add_route(&self, router: Router) -> Router {
        let pool = self.pool.clone();
        router.route(
            WORKERS_PATH,
            get(move || {
                let pool = pool.clone();
                async move { Json::<Vec<WorkerStats>>(pool.snapshot()) }
            }),
        )
    }
}
