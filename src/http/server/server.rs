//! Admin HTTP server.
//

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::http::Controller;

const DEFAULT_NAME: &str = "torpool";
const DEFAULT_PORT: &str = "8020";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Admin server: controllers mounted on one axum router.
pub struct HttpServer {
    shutdown_token: CancellationToken,
    config: Config,
    router: Router,
}

impl HttpServer {
    pub fn new(
        shutdown_token: CancellationToken,
        config: Config,
        controllers: Vec<Box<dyn Controller>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            shutdown_token,
            config,
            router: Self::build_router(controllers),
        })
    }

    /// The fully layered router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Binds the configured port and serves until the shutdown token fires.
    pub async fn listen_and_serve(&self) -> Result<()> {
        let api_cfg = self.config.api();
        let name = api_cfg
            .and_then(|a| a.name.as_deref())
            .unwrap_or(DEFAULT_NAME);
        let port = api_cfg
            .and_then(|a| a.port.as_deref())
            .unwrap_or(DEFAULT_PORT)
            .trim_start_matches(':');

        let addr: SocketAddr = format!("0.0.0.0:{}", port)
            .parse()
            .with_context(|| format!("invalid api port {:?}", port))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("admin server bind {}", addr))?;

        self.serve(listener, name).await
    }

    async fn serve(&self, listener: TcpListener, name: &str) -> Result<()> {
        let local = listener.local_addr().ok();
        info!(component = "server", event = "started", name = name, addr = ?local, "server started");

        let shutdown_token = self.shutdown_token.clone();
        let result = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
            .await;

        if let Err(e) = result {
            error!(
                component = "server",
                event = "listen_and_serve_failed",
                name = name,
                error = %e,
                "server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(component = "server", event = "stopped", name = name, "server stopped");
        Ok(())
    }

    fn build_router(controllers: Vec<Box<dyn Controller>>) -> Router {
        let mut router = Router::new();
        for controller in controllers {
            router = controller.add_route(router);
        }
        router.layer(TimeoutLayer::new(REQUEST_TIMEOUT))
    }
}

#[cfg(test)]
mod server_test;
