//! Tests for pool construction and least-loaded selection.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::{new_test_config, ConfigTrait};
    use crate::pool::{pick_least_loaded, Candidate, Pool};
    use crate::support::idle_worker;

    fn alive_pool(counts: &[usize]) -> Arc<Pool> {
        let workers: Vec<_> = (1..=counts.len()).map(idle_worker).collect();
        for (w, &count) in workers.iter().zip(counts) {
            w.mark_alive(None);
            for _ in 0..count {
                w.claim();
            }
        }
        Pool::from_workers(workers)
    }

    fn counts(pool: &Pool) -> Vec<usize> {
        pool.workers().iter().map(|w| w.conn_count()).collect()
    }

    #[test]
    fn test_build_assigns_distinct_ports_and_dirs() {
        let layout = new_test_config().worker_layout();

        for size in [1usize, 2, 7, 16] {
            let pool = Pool::build(&layout, size).expect("pool should build");
            assert_eq!(pool.len(), size);

            let ids: Vec<_> = pool.workers().iter().map(|w| w.id()).collect();
            assert_eq!(ids, (1..=size).collect::<Vec<_>>(), "ids are sequential and 1-based");

            let mut ports = HashSet::new();
            let mut dirs = HashSet::new();
            for w in pool.workers() {
                assert_eq!(w.data_addr().port(), layout.base_data_port + w.id() as u16);
                assert_eq!(w.control_addr().port(), layout.base_control_port + w.id() as u16);
                assert!(ports.insert(w.data_addr().port()), "data port reused");
                assert!(ports.insert(w.control_addr().port()), "control port reused");
                assert!(dirs.insert(w.work_dir().to_path_buf()), "work dir shared");
                assert!(!w.is_alive(), "no process is running yet");
                assert_eq!(w.conn_count(), 0);
                assert_eq!(w.latency(), None);
            }
        }
    }

    #[test]
    fn test_build_rejects_empty_pool() {
        let layout = new_test_config().worker_layout();
        assert!(Pool::build(&layout, 0).is_err());
    }

    #[test]
    fn test_prepare_dirs_creates_private_dirs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut layout = new_test_config().worker_layout();
        layout.data_dir = tmp.path().join("data");

        let pool = Pool::build(&layout, 3).expect("pool should build");
        pool.prepare_dirs().expect("dirs should be created");

        for w in pool.workers() {
            assert!(w.work_dir().is_dir());
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode = std::fs::metadata(w.work_dir()).unwrap().permissions().mode();
                assert_eq!(mode & 0o777, 0o700);
            }
        }

        // Second call is a no-op on existing directories.
        pool.prepare_dirs().expect("prepare_dirs is repeatable");
    }

    #[test]
    fn test_pick_least_loaded_prefers_minimum_then_lowest_id() {
        let c = |id, conn_count| Candidate { id, conn_count, alive: true };

        assert_eq!(pick_least_loaded(&[c(1, 2), c(2, 0), c(3, 1)]), Some(1));
        assert_eq!(pick_least_loaded(&[c(1, 1), c(2, 1), c(3, 1)]), Some(0));
        assert_eq!(pick_least_loaded(&[c(1, 3), c(2, 1), c(3, 1)]), Some(1));
        assert_eq!(pick_least_loaded(&[]), None);
    }

    #[test]
    fn test_pick_least_loaded_skips_dead_workers() {
        let candidates = [
            Candidate { id: 1, conn_count: 0, alive: false },
            Candidate { id: 2, conn_count: 5, alive: true },
            Candidate { id: 3, conn_count: 4, alive: true },
        ];
        assert_eq!(pick_least_loaded(&candidates), Some(2));

        let all_dead = [
            Candidate { id: 1, conn_count: 2, alive: false },
            Candidate { id: 2, conn_count: 1, alive: false },
        ];
        assert_eq!(pick_least_loaded(&all_dead), Some(1), "falls back to the whole pool");
    }

    #[test]
    fn test_selection_picks_a_global_minimum() {
        // Exhaustive over small count vectors.
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    let snapshot = [a, b, c];
                    let candidates: Vec<_> = snapshot
                        .iter()
                        .enumerate()
                        .map(|(i, &n)| Candidate { id: i + 1, conn_count: n, alive: true })
                        .collect();
                    let idx = pick_least_loaded(&candidates).unwrap();
                    let min = *snapshot.iter().min().unwrap();
                    assert_eq!(snapshot[idx], min);
                    assert_eq!(idx, snapshot.iter().position(|&n| n == min).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_balanced_routing_scenario() {
        let pool = alive_pool(&[2, 0, 1]);

        let slot = pool.acquire().expect("a worker is available");
        assert_eq!(slot.worker().id(), 2);
        assert_eq!(counts(&pool), vec![2, 1, 1]);

        drop(slot);
        assert_eq!(counts(&pool), vec![2, 0, 1]);
    }

    #[test]
    fn test_acquire_on_empty_pool() {
        let pool = Pool::from_workers(Vec::new());
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn test_release_never_goes_negative() {
        let w = idle_worker(1);
        w.release();
        w.release();
        assert_eq!(w.conn_count(), 0);
    }

    #[test]
    fn test_acquire_spreads_sequential_sessions() {
        let pool = alive_pool(&[0, 0, 0]);
        let slots: Vec<_> = (0..6).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(counts(&pool), vec![2, 2, 2]);

        let ids: Vec<_> = slots.iter().map(|s| s.worker().id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 1, 2, 3]);

        drop(slots);
        assert_eq!(counts(&pool), vec![0, 0, 0]);
    }

    #[test]
    fn test_concurrent_acquire_keeps_counts_exact() {
        let pool = alive_pool(&[0, 0, 0, 0]);
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let mut held = Vec::new();
                    for i in 0..500 {
                        held.push(pool.acquire().unwrap());
                        if i % 3 == 0 {
                            held.pop();
                        }
                    }
                    held.len()
                })
            })
            .collect();

        let held: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        // Slots held by finished threads were dropped on return.
        assert_eq!(held, 8 * (500 - 167));
        assert_eq!(pool.active_sessions(), 0);
    }

    #[test]
    fn test_stats_reflect_live_fields() {
        let w = idle_worker(4);
        w.mark_alive(Some(4242));
        w.claim();
        w.record_latency(Duration::from_millis(120));
        w.inc_restarts();
        w.inc_rotations();

        let stats = w.stats();
        assert_eq!(stats.id, 4);
        assert_eq!(stats.data_port, 9104);
        assert_eq!(stats.control_port, 9204);
        assert!(stats.alive);
        assert_eq!(stats.pid, Some(4242));
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.latency_ms, Some(120));
        assert_eq!(stats.restarts, 1);
        assert_eq!(stats.rotations, 1);

        w.mark_dead();
        assert!(!w.is_alive());
        assert_eq!(w.pid(), None);
        assert_eq!(w.latency(), Some(Duration::from_millis(120)), "latency stays stale");
    }
}
