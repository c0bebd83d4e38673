// Package api provides the manual rotation controller.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use crate::control::Rotator;
use crate::http::Controller;
use crate::metrics::RotationReason;
use crate::pool::Pool;

pub const ROTATE_PATH: &str = "/torpool/rotate";
pub const ROTATE_ONE_PATH: &str = "/torpool/rotate/:id";

#[derive(Debug, Serialize)]
struct RotateResponse {
    status: u16,
    requested: Vec<usize>,
    delivered: u64,
}

/// RotateController sends rotation directives on demand, outside the
/// scheduler's cadence.
#[derive(Clone)]
pub struct RotateController {
    pool: Arc<Pool>,
    rotator: Arc<dyn Rotator>,
}

impl RotateController {
    pub fn new(pool: Arc<Pool>, rotator: Arc<dyn Rotator>) -> Self {
        Self { pool, rotator }
    }

    async fn rotate_all(&self) -> Response {
        let ids: Vec<usize> = self.pool.workers().iter().map(|w| w.id()).collect();
        self.rotate(ids).await
    }

    async fn rotate_one(&self, id: usize) -> Response {
        if self.pool.get(id).is_none() {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "status": 404,
                    "message": format!("worker {} not found", id),
                })),
            )
                .into_response();
        }
        self.rotate(vec![id]).await
    }

    async fn rotate(&self, ids: Vec<usize>) -> Response {
        let workers: Vec<_> = ids.iter().filter_map(|id| self.pool.get(*id)).collect();
        let before: u64 = workers.iter().map(|w| w.rotations()).sum();

        join_all(
            workers
                .iter()
                .map(|w| self.rotator.rotate(w, RotationReason::Manual)),
        )
        .await;

        let after: u64 = workers.iter().map(|w| w.rotations()).sum();
        Json(RotateResponse {
            status: 200,
            requested: ids,
            delivered: after.saturating_sub(before),
        })
        .into_response()
    }
}

impl Controller for RotateController {
    fn add_route(&self, router: Router) -> Router {
        let all = self.clone();
        let one = self.clone();
        router
            .route(
                ROTATE_PATH,
                get(move || {
                    let controller = all.clone();
                    async move { controller.rotate_all().await }
                }),
            )
            .route(
                ROTATE_ONE_PATH,
                get(move |Path(id): Path<usize>| {
                    let controller = one.clone();
                    async move { controller.rotate_one(id).await }
                }),
            )
    }
}
