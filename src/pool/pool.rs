// Package pool owns the fixed set of worker descriptors.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::WorkerLayout;

use super::worker::{ConnSlot, Worker, WorkerStats};

/// Bounded number of optimistic selection attempts before the balancer
/// settles for the last candidate it saw.
const MAX_CLAIM_ATTEMPTS: usize = 8;

/// Pool is the ordered, fixed-size set of workers. Membership never
/// changes after construction, so the list itself needs no lock.
#[derive(Debug)]
pub struct Pool {
    workers: Vec<Arc<Worker>>,
}

/// Candidate seen by one selection scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: usize,
    pub conn_count: usize,
    pub alive: bool,
}

impl Pool {
    /// Builds `size` workers with 1-based ids; worker `id` gets ports
    /// `base + id` and directory `data_dir/<id>`.
    pub fn build(layout: &WorkerLayout, size: usize) -> Result<Arc<Self>> {
        anyhow::ensure!(size > 0, "pool size must be at least 1");

        let mut workers = Vec::with_capacity(size);
        for id in 1..=size {
            let data_port = layout
                .data_port(id)
                .with_context(|| format!("data port overflow for worker {}", id))?;
            let control_port = layout
                .control_port(id)
                .with_context(|| format!("control port overflow for worker {}", id))?;

            workers.push(Arc::new(Worker::new(
                id,
                SocketAddr::new(layout.host, data_port),
                SocketAddr::new(layout.host, control_port),
                layout.work_dir(id),
            )));
        }

        Ok(Self::from_workers(workers))
    }

    /// Wraps already constructed workers, keeping their order.
    pub fn from_workers(workers: Vec<Arc<Worker>>) -> Arc<Self> {
        Arc::new(Self { workers })
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Arc<Worker>> {
        self.workers.iter().find(|w| w.id() == id)
    }

    pub fn alive_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    pub fn active_sessions(&self) -> usize {
        self.workers.iter().map(|w| w.conn_count()).sum()
    }

    pub fn snapshot(&self) -> Vec<WorkerStats> {
        self.workers.iter().map(|w| w.stats()).collect()
    }

    /// Creates every worker's private working directory.
    pub fn prepare_dirs(&self) -> Result<()> {
        for worker in &self.workers {
            create_private_dir(worker.work_dir()).with_context(|| {
                format!(
                    "create work dir {:?} for worker {}",
                    worker.work_dir(),
                    worker.id()
                )
            })?;
            debug!(
                component = "pool",
                event = "work_dir_ready",
                worker = worker.id(),
                dir = ?worker.work_dir(),
                "work dir ready"
            );
        }
        info!(
            component = "pool",
            event = "dirs_prepared",
            workers = self.workers.len(),
            "worker directories prepared"
        );
        Ok(())
    }

    /// Picks the least loaded worker and takes one session slot on it.
    ///
    /// A slot is only taken if the worker's count has not moved since the
    /// scan, otherwise the scan is repeated, so concurrent callers cannot
    /// both act on the same stale minimum.
    pub fn acquire(&self) -> Option<ConnSlot> {
        let mut last = None;
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let candidates = self.candidates();
            let idx = pick_least_loaded(&candidates)?;
            let worker = &self.workers[idx];
            if worker.try_claim(candidates[idx].conn_count) {
                return Some(ConnSlot::new(worker.clone()));
            }
            last = Some(idx);
        }

        // Heavy contention: take the last pick unconditionally, the
        // increment itself still happens under the worker's lock.
        let worker = &self.workers[last?];
        worker.claim();
        Some(ConnSlot::new(worker.clone()))
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.workers
            .iter()
            .map(|w| Candidate {
                id: w.id(),
                conn_count: w.conn_count(),
                alive: w.is_alive(),
            })
            .collect()
    }
}

/// Returns the index of the candidate with the fewest sessions, ties going
/// to the lowest id. Only alive candidates are considered unless none is
/// alive, in which case the whole set is scanned.
pub fn pick_least_loaded(candidates: &[Candidate]) -> Option<usize> {
    let any_alive = candidates.iter().any(|c| c.alive);
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.alive || !any_alive)
        .min_by_key(|(_, c)| (c.conn_count, c.id))
        .map(|(idx, _)| idx)
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}
