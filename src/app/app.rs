// Pool application: wires workers, supervision, routing and admin API.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigTrait};
use crate::control::{ControlClient, Rotator};
use crate::http::HttpServer;
use crate::liveness;
use crate::pool::Pool;
use crate::router::Balancer;
use crate::supervisor::Supervisor;
use crate::workers::{self, HealthMonitor, RotationScheduler, TcpProbe};

use super::server::make_http_server;

const TELEMETRY_EVERY: Duration = Duration::from_secs(5);

/// App owns the worker pool and every long-running task around it.
pub struct App {
    cfg: Config,
    shutdown_token: CancellationToken,
    pool: Arc<Pool>,
    supervisor: Arc<Supervisor>,
    rotator: Arc<dyn Rotator>,
    probe: Arc<dyn liveness::Prober>,
    server: Option<Arc<HttpServer>>,
    balancer_listening: Arc<AtomicBool>,
}

impl App {
    /// Builds the pool from the configuration; nothing is started yet.
    pub fn new(
        shutdown_token: CancellationToken,
        cfg: Config,
        probe: Arc<dyn liveness::Prober>,
    ) -> Result<Arc<Self>> {
        let layout = cfg.worker_layout();
        let pool = Pool::build(&layout, cfg.pool_size())?;
        let supervisor = Supervisor::new(shutdown_token.clone(), &layout);
        let rotator: Arc<dyn Rotator> = Arc::new(ControlClient::new(cfg.control_timeout()));

        let server = cfg
            .api()
            .map(|api| api.enabled)
            .unwrap_or(true)
            .then(|| {
                make_http_server(
                    shutdown_token.clone(),
                    &cfg,
                    pool.clone(),
                    rotator.clone(),
                    probe.clone(),
                )
            });

        Ok(Arc::new(Self {
            cfg,
            shutdown_token,
            pool,
            supervisor,
            rotator,
            probe,
            server,
            balancer_listening: Arc::new(AtomicBool::new(false)),
        }))
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    pub fn server(&self) -> Option<&Arc<HttpServer>> {
        self.server.as_ref()
    }

    /// Binds the balancer address from the configuration.
    pub async fn bind_balancer(&self) -> Result<TcpListener> {
        let addr: SocketAddr = self
            .cfg
            .balancer_addr()
            .parse()
            .with_context(|| format!("invalid balancer addr {:?}", self.cfg.balancer_addr()))?;
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("balancer bind {}", addr))
    }

    /// Starts everything and resolves once every task has stopped after
    /// the shutdown token fired. Setup failures (work dirs, balancer bind)
    /// are returned before any process is launched.
    pub async fn serve(self: &Arc<Self>) -> Result<()> {
        let listener = self.bind_balancer().await?;
        self.serve_with(listener).await
    }

    /// Same as [`App::serve`] on an already bound balancer listener.
    pub async fn serve_with(self: &Arc<Self>, listener: TcpListener) -> Result<()> {
        self.pool.prepare_dirs()?;

        info!(
            component = "app",
            event = "banner",
            workers = self.pool.len(),
            balancer = ?listener.local_addr().ok(),
            binary = %self.cfg.worker_layout().binary,
            "torpool starting"
        );

        let mut tasks = self.start_workers();
        tasks.extend(self.start_maintenance());
        tasks.push(self.start_balancer(listener));
        if let Some(server) = self.server.clone() {
            tasks.push(tokio::spawn(async move {
                if let Err(e) = server.listen_and_serve().await {
                    error!(
                        component = "app",
                        scope = "server",
                        event = "serve_failed",
                        error = %e,
                        "admin server failed to serve"
                    );
                }
            }));
        }

        self.probe
            .watch(vec![self.clone() as Arc<dyn liveness::Service>]);

        info!(component = "app", event = "started", "application lifecycle");

        for res in join_all(tasks).await {
            if let Err(e) = res {
                error!(component = "app", event = "task_failed", error = %e, "task ended abnormally");
            }
        }

        info!(component = "app", event = "stopped", "application lifecycle");
        Ok(())
    }

    /// Launches every worker process. A failed first launch is logged and
    /// that worker stays dead; the others proceed.
    fn start_workers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.pool.len());
        for worker in self.pool.workers() {
            match self.supervisor.start(worker.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => error!(
                    component = "app",
                    event = "worker_launch_failed",
                    worker = worker.id(),
                    error = %e,
                    "worker failed to launch"
                ),
            }
        }
        info!(
            component = "app",
            event = "workers_launched",
            alive = self.pool.alive_count(),
            total = self.pool.len(),
            "workers launched"
        );
        handles
    }

    fn start_maintenance(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if self.cfg.rotation().map(|r| r.enabled).unwrap_or(true) {
            let scheduler = RotationScheduler::new(
                self.shutdown_token.clone(),
                self.pool.clone(),
                self.rotator.clone(),
                self.cfg.rotation_interval(),
            );
            handles.push(tokio::spawn(async move { scheduler.run().await }));
        } else {
            warn!(component = "app", event = "rotation_disabled", "scheduled rotation is disabled");
        }

        if self.cfg.health().map(|h| h.enabled).unwrap_or(true) {
            let monitor = HealthMonitor::new(
                self.shutdown_token.clone(),
                self.pool.clone(),
                Arc::new(TcpProbe::new(self.cfg.health_timeout())),
                self.rotator.clone(),
                self.cfg.health_interval(),
                self.cfg.latency_ceiling(),
            );
            handles.push(tokio::spawn(async move { monitor.run().await }));
        }

        handles.push(tokio::spawn(workers::telemetry::logger(
            self.shutdown_token.clone(),
            self.pool.clone(),
            TELEMETRY_EVERY,
        )));

        handles
    }

    fn start_balancer(&self, listener: TcpListener) -> JoinHandle<()> {
        let balancer = Balancer::new(
            self.shutdown_token.clone(),
            self.pool.clone(),
            self.cfg.dial_timeout(),
        );
        let listening = self.balancer_listening.clone();
        listening.store(true, Ordering::Relaxed);
        tokio::spawn(async move {
            balancer.serve(listener).await;
            listening.store(false, Ordering::Relaxed);
        })
    }

    /// Alive while the balancer accepts and at least one worker runs.
    pub fn is_alive(&self) -> bool {
        if !self.balancer_listening.load(Ordering::Relaxed) {
            warn!(component = "app", scope = "balancer", event = "gone_away", "balancer is not listening");
            return false;
        }
        if self.pool.alive_count() == 0 {
            warn!(component = "app", scope = "pool", event = "no_workers", "no worker is alive");
            return false;
        }
        true
    }
}

impl liveness::Service for App {
    fn is_alive(&self, _timeout: Duration) -> bool {
        App::is_alive(self)
    }
}
