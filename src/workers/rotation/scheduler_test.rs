//! Tests for the rotation scheduler.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::control::{ControlClient, NEWNYM_DIRECTIVE};
    use crate::metrics::RotationReason;
    use crate::pool::Pool;
    use crate::support::{idle_worker, wait_until, worker_at, ControlListener, EchoServer, RecordingRotator};
    use crate::workers::RotationScheduler;

    const INTERVAL: Duration = Duration::from_secs(5 * 60);

    #[tokio::test(start_paused = true)]
    async fn test_rotates_every_worker_each_interval() {
        // Worker 2 is dead and loaded: it is rotated all the same.
        let workers: Vec<_> = (1..=3).map(idle_worker).collect();
        workers[0].mark_alive(None);
        workers[2].mark_alive(None);
        workers[1].claim();
        let pool = Pool::from_workers(workers);
        let rotator = RecordingRotator::new();
        let shutdown = CancellationToken::new();
        let scheduler = Arc::new(RotationScheduler::new(
            shutdown.clone(),
            pool,
            rotator.clone(),
            INTERVAL,
        ));

        let task = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run().await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rotator.len(), 0, "nothing is rotated at start");

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(rotator.len(), 3);
        for id in 1..=3 {
            assert_eq!(rotator.count_for(id), 1);
        }
        assert!(rotator
            .calls()
            .iter()
            .all(|(_, reason)| *reason == RotationReason::Scheduled));

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(rotator.len(), 6);

        shutdown.cancel();
        task.await.unwrap();

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(rotator.len(), 6, "no final round after shutdown");
    }

    #[tokio::test]
    async fn test_rotate_all_reaches_real_control_channels() {
        let data = EchoServer::start().await;
        let control_a = ControlListener::start().await;
        let control_b = ControlListener::start().await;
        let pool = Pool::from_workers(vec![
            worker_at(1, data.addr(), control_a.addr()),
            worker_at(2, data.addr(), control_b.addr()),
        ]);
        let scheduler = RotationScheduler::new(
            CancellationToken::new(),
            pool.clone(),
            Arc::new(ControlClient::new(Duration::from_secs(1))),
            INTERVAL,
        );

        scheduler.rotate_all().await;

        for control in [&control_a, &control_b] {
            let done = wait_until(Duration::from_secs(2), || !control.received().is_empty()).await;
            assert!(done, "directive must arrive");
            assert_eq!(control.received(), vec![NEWNYM_DIRECTIVE.to_vec()]);
        }
        assert!(pool.workers().iter().all(|w| w.rotations() == 1));
    }
}
