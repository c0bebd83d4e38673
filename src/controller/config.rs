// Package api provides config display controller.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::Arc;

use crate::config::Config;
use crate::http::Controller;

pub const CONFIG_PATH: &str = "/torpool/config";

/// ShowConfigController displays the loaded configuration.
pub struct ShowConfigController {
    cfg: Arc<Config>,
}

impl ShowConfigController {
    pub fn new(cfg: Config) -> Self {
        Self { cfg: Arc::new(cfg) }
    }

    async fn show_config(cfg: Arc<Config>) -> impl IntoResponse {
        let json = serde_json::to_string(&*cfg)
            .unwrap_or_else(|_| r#"{"error": "failed to serialize config"}"#.to_string());

        (
            StatusCode::OK,
            [("content-type", "application/json; charset=utf-8")],
            json,
        )
    }
}

impl Controller for ShowConfigController {
    fn add_route(&self, router: Router) -> Router {
        let cfg = self.cfg.clone();
        router.route(
            CONFIG_PATH,
            get(move || {
                let cfg = cfg.clone();
                async move { Self::show_config(cfg).await }
            }),
        )
    }
}
