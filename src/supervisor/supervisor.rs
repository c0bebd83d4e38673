// Package supervisor keeps one OS process per worker running.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::WorkerLayout;
use crate::metrics;
use crate::pool::Worker;

use super::command::Launcher;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to launch worker {id} with {binary:?}: {source}")]
    Launch {
        id: usize,
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

/// Supervisor launches worker processes and, once a process is running,
/// owns its handle in a dedicated watch task that restarts it after a
/// fixed delay whenever it exits. There is no retry limit.
pub struct Supervisor {
    shutdown_token: CancellationToken,
    launcher: Launcher,
    restart_delay: Duration,
}

impl Supervisor {
    pub fn new(shutdown_token: CancellationToken, layout: &WorkerLayout) -> Arc<Self> {
        Self::with_launcher(
            shutdown_token,
            Launcher::from_layout(layout),
            layout.restart_delay,
        )
    }

    pub fn with_launcher(
        shutdown_token: CancellationToken,
        launcher: Launcher,
        restart_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            shutdown_token,
            launcher,
            restart_delay,
        })
    }

    /// Launches the worker's process and marks the worker alive.
    /// On failure the worker is left untouched.
    pub fn spawn(&self, worker: &Worker) -> Result<Child, SupervisorError> {
        let child = self
            .launcher
            .command(worker)
            .spawn()
            .map_err(|source| SupervisorError::Launch {
                id: worker.id(),
                binary: self.launcher.binary().to_string(),
                source,
            })?;

        worker.mark_alive(child.id());
        info!(
            component = "supervisor",
            event = "worker_started",
            worker = worker.id(),
            pid = ?child.id(),
            data_port = worker.data_addr().port(),
            control_port = worker.control_addr().port(),
            "worker started"
        );
        Ok(child)
    }

    /// Launches the worker and installs its watch task. When the first
    /// launch fails no watch task is installed.
    pub fn start(self: &Arc<Self>, worker: Arc<Worker>) -> Result<JoinHandle<()>, SupervisorError> {
        let child = match self.spawn(&worker) {
            Ok(child) => child,
            Err(e) => {
                metrics::inc_worker_launch_failures(worker.id());
                return Err(e);
            }
        };

        let supervisor = self.clone();
        Ok(tokio::spawn(async move {
            supervisor.watch(worker, child).await;
        }))
    }

    /// Waits for the current process to exit, then relaunches after the
    /// restart delay, forever or until shutdown.
    async fn watch(&self, worker: Arc<Worker>, mut child: Child) {
        loop {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = self.shutdown_token.cancelled() => {
                    self.stop(&worker, &mut child).await;
                    return;
                }
            };

            if status.is_err() {
                // Exit was not observed, make sure the process is gone
                // before a replacement is launched.
                kill(&worker, &mut child, "failed to kill untracked worker before restart").await;
            }
            worker.mark_dead();
            log_exit(&worker, status);

            match self.relaunch(&worker).await {
                Some(next) => child = next,
                None => return,
            }
        }
    }

    /// Retries the launch every restart delay until it succeeds. Returns
    /// None if shutdown fires first.
    async fn relaunch(&self, worker: &Worker) -> Option<Child> {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.restart_delay) => {}
                _ = self.shutdown_token.cancelled() => return None,
            }

            match self.spawn(worker) {
                Ok(child) => {
                    worker.inc_restarts();
                    metrics::inc_worker_restarts(worker.id());
                    return Some(child);
                }
                Err(e) => {
                    metrics::inc_worker_launch_failures(worker.id());
                    error!(
                        component = "supervisor",
                        event = "restart_failed",
                        worker = worker.id(),
                        retry_in = ?self.restart_delay,
                        error = %e,
                        "worker restart failed"
                    );
                }
            }
        }
    }

    async fn stop(&self, worker: &Worker, child: &mut Child) {
        kill(worker, child, "failed to kill worker on shutdown").await;
        worker.mark_dead();
        info!(
            component = "supervisor",
            event = "worker_stopped",
            worker = worker.id(),
            "worker stopped"
        );
    }
}

/// Kills the child and waits for it, logging a failure at warn.
/// Returns whether the kill went through.
pub(crate) async fn kill(worker: &Worker, child: &mut Child, msg: &str) -> bool {
    match child.kill().await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                component = "supervisor",
                event = "kill_failed",
                worker = worker.id(),
                error = %e,
                "{}",
                msg
            );
            false
        }
    }
}

fn log_exit(worker: &Worker, status: std::io::Result<ExitStatus>) {
    match status {
        Ok(status) if status.success() => info!(
            component = "supervisor",
            event = "worker_exited",
            worker = worker.id(),
            "worker exited, restarting"
        ),
        Ok(status) => warn!(
            component = "supervisor",
            event = "worker_crashed",
            worker = worker.id(),
            status = %status,
            "worker crashed, restarting"
        ),
        Err(e) => warn!(
            component = "supervisor",
            event = "wait_failed",
            worker = worker.id(),
            error = %e,
            "lost track of worker process, restarting"
        ),
    }
}
