// Package health provides the data-channel latency probe.

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// LatencyProbe measures how long a worker's data channel takes to answer.
#[async_trait::async_trait]
pub trait LatencyProbe: Send + Sync {
    /// Returns the round trip, or None when the endpoint did not answer.
    async fn measure(&self, addr: SocketAddr) -> Option<Duration>;
}

/// Bare TCP connect/disconnect probe, no protocol bytes are exchanged.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl LatencyProbe for TcpProbe {
    async fn measure(&self, addr: SocketAddr) -> Option<Duration> {
        let started = Instant::now();
        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                let elapsed = started.elapsed();
                drop(stream);
                Some(elapsed)
            }
            Ok(Err(e)) => {
                debug!(component = "health", %addr, error = %e, "probe connect failed");
                None
            }
            Err(_) => {
                debug!(component = "health", %addr, timeout = ?self.timeout, "probe timed out");
                None
            }
        }
    }
}
