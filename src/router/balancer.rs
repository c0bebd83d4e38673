// Package router provides the accept loop and per-session routing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dedlog;
use crate::metrics;
use crate::pool::{ConnSlot, Pool};

use super::proxy::proxy;

#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("dial {addr} timed out after {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },
    #[error("dial {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Balancer accepts clients and assigns each one to a worker for the
/// lifetime of its connection.
pub struct Balancer {
    shutdown_token: CancellationToken,
    pool: Arc<Pool>,
    dial_timeout: Duration,
}

impl Balancer {
    pub fn new(shutdown_token: CancellationToken, pool: Arc<Pool>, dial_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            shutdown_token,
            pool,
            dial_timeout,
        })
    }

    /// Runs the accept loop on an already bound listener. Accept errors are
    /// logged and the loop continues.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        let local = listener.local_addr().ok();
        info!(
            component = "balancer",
            event = "listening",
            addr = ?local,
            workers = self.pool.len(),
            "balancer is listening"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!(component = "balancer", event = "stopped", "balancer stopped accepting");
                    return;
                }
                accepted = listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        let this = self.clone();
                        tokio::spawn(async move { this.handle(client, peer).await });
                    }
                    Err(err) => {
                        warn!(
                            component = "balancer",
                            event = "accept_failed",
                            error = %err,
                            "accept failed"
                        );
                    }
                }
            }
        }
    }

    /// One session: pick a worker, dial it, pump bytes, release the slot.
    async fn handle(&self, client: TcpStream, peer: SocketAddr) {
        let Some(slot) = self.pool.acquire() else {
            debug!(component = "balancer", event = "empty_pool", peer = %peer, "no worker to route to");
            return;
        };

        let upstream = match self.dial(&slot).await {
            Ok(stream) => stream,
            Err(err) => {
                metrics::inc_dial_failures(slot.worker().id());
                dedlog::err(Some(&err), Some(&format!("worker={}", slot.worker().id())), "worker dial failed");
                // Client and slot are dropped here; nothing is sent back.
                return;
            }
        };

        metrics::inc_sessions(slot.worker().id());
        debug!(
            component = "balancer",
            event = "session_open",
            peer = %peer,
            worker = slot.worker().id(),
            "session routed"
        );

        match proxy(client, upstream).await {
            Ok(transferred) => {
                metrics::add_bytes("upstream", transferred.upstream);
                metrics::add_bytes("downstream", transferred.downstream);
                debug!(
                    component = "balancer",
                    event = "session_closed",
                    peer = %peer,
                    worker = slot.worker().id(),
                    upstream = transferred.upstream,
                    downstream = transferred.downstream,
                    "session closed"
                );
            }
            Err(err) => {
                dedlog::err(Some(&err), Some(&format!("worker={}", slot.worker().id())), "proxy session failed");
            }
        }
        drop(slot);
    }

    async fn dial(&self, slot: &ConnSlot) -> Result<TcpStream, DialError> {
        let addr = slot.worker().data_addr();
        match timeout(self.dial_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(DialError::Connect { addr, source }),
            Err(_) => Err(DialError::Timeout {
                addr,
                timeout: self.dial_timeout,
            }),
        }
    }
}
