// Package router provides the bidirectional byte pump.

use tokio::io;
use tokio::net::TcpStream;

/// Bytes moved in each direction before the session ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Transferred {
    pub upstream: u64,
    pub downstream: u64,
}

/// Copies bytes both ways until either direction ends, then returns. Both
/// sockets are closed when the halves are dropped on return.
///
/// The two copies run concurrently in one task; whichever finishes first
/// cancels the other, so a half-closed session never lingers. An I/O error
/// on the finishing direction is returned instead of the byte counts.
pub async fn proxy(client: TcpStream, worker: TcpStream) -> io::Result<Transferred> {
    let (mut client_rd, mut client_wr) = client.into_split();
    let (mut worker_rd, mut worker_wr) = worker.into_split();

    let mut transferred = Transferred::default();
    tokio::select! {
        res = io::copy(&mut client_rd, &mut worker_wr) => {
            transferred.upstream = res?;
        }
        res = io::copy(&mut worker_rd, &mut client_wr) => {
            transferred.downstream = res?;
        }
    }
    Ok(transferred)
}
