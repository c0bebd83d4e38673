// Common test utilities.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use crate::pool::Worker;

/// Returns a loopback address on which nothing is listening.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Builds a worker pointing at the given endpoints.
pub fn worker_at(id: usize, data_addr: SocketAddr, control_addr: SocketAddr) -> Arc<Worker> {
    Arc::new(Worker::new(
        id,
        data_addr,
        control_addr,
        PathBuf::from(format!("/tmp/torpool-test/{}", id)),
    ))
}

/// Builds a worker whose endpoints are never dialed.
pub fn idle_worker(id: usize) -> Arc<Worker> {
    let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    worker_at(
        id,
        SocketAddr::new(host, 9100 + id as u16),
        SocketAddr::new(host, 9200 + id as u16),
    )
}

/// Polls `cond` every 10ms until it holds or the deadline passes.
pub async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
