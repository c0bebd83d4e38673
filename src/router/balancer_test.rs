//! Tests for session routing.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::sync::CancellationToken;

    use crate::pool::{Pool, Worker};
    use crate::router::Balancer;
    use crate::support::{closed_addr, idle_worker, wait_until, worker_at, EchoServer};

    struct Running {
        addr: std::net::SocketAddr,
        shutdown: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    async fn start(pool: Arc<Pool>) -> Running {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let balancer = Balancer::new(shutdown.clone(), pool, Duration::from_secs(1));
        let task = tokio::spawn(balancer.serve(listener));
        Running { addr, shutdown, task }
    }

    /// Opens a session and waits for one echoed byte, proving it was routed.
    async fn open_session(addr: std::net::SocketAddr) -> TcpStream {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"x").await.unwrap();
        let mut buf = [0u8; 1];
        conn.read_exact(&mut buf).await.unwrap();
        conn
    }

    fn counts(pool: &Pool) -> Vec<usize> {
        pool.workers().iter().map(|w| w.conn_count()).collect()
    }

    fn alive(workers: Vec<Arc<Worker>>) -> Vec<Arc<Worker>> {
        for w in &workers {
            w.mark_alive(None);
        }
        workers
    }

    #[tokio::test]
    async fn test_sessions_spread_across_workers() {
        let echoes = [EchoServer::start().await, EchoServer::start().await, EchoServer::start().await];
        let pool = Pool::from_workers(alive(
            echoes
                .iter()
                .enumerate()
                .map(|(i, e)| worker_at(i + 1, e.addr(), unused_control()))
                .collect(),
        ));
        let running = start(pool.clone()).await;

        let mut sessions = Vec::new();
        for _ in 0..3 {
            sessions.push(open_session(running.addr).await);
        }
        assert_eq!(counts(&pool), vec![1, 1, 1]);
        assert!(echoes.iter().all(|e| e.accepted() == 1));

        // Closing the second session frees worker 2, which gets the next one.
        drop(sessions.remove(1));
        assert!(wait_until(Duration::from_secs(2), || counts(&pool) == vec![1, 0, 1]).await);
        sessions.push(open_session(running.addr).await);
        assert_eq!(counts(&pool), vec![1, 1, 1]);
        assert_eq!(echoes[1].accepted(), 2);

        drop(sessions);
        assert!(wait_until(Duration::from_secs(2), || pool.active_sessions() == 0).await);

        running.shutdown.cancel();
        running.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let echo = EchoServer::start().await;
        let pool = Pool::from_workers(alive(vec![worker_at(1, echo.addr(), unused_control())]));
        let running = start(pool.clone()).await;

        let mut conn = TcpStream::connect(running.addr).await.unwrap();
        let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        conn.write_all(&payload).await.unwrap();
        let mut back = vec![0u8; payload.len()];
        conn.read_exact(&mut back).await.unwrap();
        assert_eq!(back, payload);

        drop(conn);
        assert!(wait_until(Duration::from_secs(2), || pool.active_sessions() == 0).await);
        running.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_dial_failure_closes_client_and_frees_slot() {
        let worker = worker_at(1, closed_addr().await, unused_control());
        worker.mark_alive(None);
        let pool = Pool::from_workers(vec![worker.clone()]);
        let running = start(pool.clone()).await;

        let mut conn = TcpStream::connect(running.addr).await.unwrap();
        let mut buf = Vec::new();
        // The balancer closes without writing anything.
        let read = tokio::time::timeout(Duration::from_secs(3), conn.read_to_end(&mut buf))
            .await
            .expect("client must be closed");
        assert!(read.map(|n| n == 0).unwrap_or(true));
        assert!(buf.is_empty());

        assert!(wait_until(Duration::from_secs(2), || worker.conn_count() == 0).await);
        running.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_dead_pool_still_routes() {
        // No worker alive: the whole pool is eligible.
        let echo = EchoServer::start().await;
        let pool = Pool::from_workers(vec![worker_at(1, echo.addr(), unused_control()), idle_worker(2)]);
        let running = start(pool.clone()).await;

        let _session = open_session(running.addr).await;
        assert_eq!(counts(&pool), vec![1, 0]);
        running.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_cancel_stops_accepting() {
        let pool = Pool::from_workers(vec![idle_worker(1)]);
        let running = start(pool).await;

        running.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), running.task)
            .await
            .expect("accept loop must stop")
            .unwrap();
        assert!(TcpStream::connect(running.addr).await.is_err());
    }

    /// Control endpoints are never dialed by the balancer.
    fn unused_control() -> std::net::SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }
}
