// Package control provides the one-way rotation directive.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::metrics::{self, RotationReason};
use crate::pool::Worker;

/// Empty-credential authentication followed by the new-identity signal.
/// The worker's reply is never read.
pub const NEWNYM_DIRECTIVE: &[u8] = b"AUTHENTICATE \"\"\r\nSIGNAL NEWNYM\r\n";

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },
    #[error("control connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("control write to {addr} failed: {source}")]
    Write {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Rotator forces a worker to build a new circuit. Delivery is
/// best-effort and there is no acknowledgment to wait for.
#[async_trait::async_trait]
pub trait Rotator: Send + Sync {
    async fn rotate(&self, worker: &Worker, reason: RotationReason);
}

/// Rotator speaking the worker's line-based control protocol over TCP.
#[derive(Debug, Clone)]
pub struct ControlClient {
    connect_timeout: Duration,
}

impl ControlClient {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait::async_trait]
impl Rotator for ControlClient {
    async fn rotate(&self, worker: &Worker, reason: RotationReason) {
        match send_directive(worker.control_addr(), self.connect_timeout).await {
            Ok(()) => {
                worker.inc_rotations();
                metrics::inc_rotations(reason);
                info!(
                    component = "control",
                    event = "newnym_sent",
                    worker = worker.id(),
                    reason = reason.as_str(),
                    "circuit rotation triggered"
                );
            }
            Err(e) => {
                metrics::inc_rotation_failures();
                warn!(
                    component = "control",
                    event = "newnym_failed",
                    worker = worker.id(),
                    reason = reason.as_str(),
                    error = %e,
                    "control channel unreachable"
                );
            }
        }
    }
}

/// Connects to `addr`, writes the rotation directive and closes.
pub async fn send_directive(addr: SocketAddr, connect_timeout: Duration) -> Result<(), ControlError> {
    let mut stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(ControlError::Connect { addr, source }),
        Err(_) => {
            return Err(ControlError::ConnectTimeout {
                addr,
                timeout: connect_timeout,
            })
        }
    };

    stream
        .write_all(NEWNYM_DIRECTIVE)
        .await
        .map_err(|source| ControlError::Write { addr, source })?;
    // The peer may already have hung up, which is fine for a one-way send.
    let _ = stream.shutdown().await;
    Ok(())
}
