// Package pool provides the worker descriptor.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;

const NO_LATENCY: u64 = u64::MAX;
const NO_PID: u32 = 0;

/// Worker describes one managed process: its fixed addresses and working
/// directory plus the live counters the balancer and health monitor share.
///
/// The OS process handle itself is not stored here; it is owned by the
/// supervisor task watching this worker.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    data_addr: SocketAddr,
    control_addr: SocketAddr,
    work_dir: PathBuf,
    /// Active proxy sessions, guarded by the worker's own lock.
    conn_count: Mutex<usize>,
    alive: AtomicBool,
    pid: AtomicU32,
    latency_ms: AtomicU64,
    restarts: AtomicU64,
    rotations: AtomicU64,
}

/// Point-in-time copy of a worker's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub id: usize,
    pub data_port: u16,
    pub control_port: u16,
    pub work_dir: PathBuf,
    pub alive: bool,
    pub pid: Option<u32>,
    pub connections: usize,
    pub latency_ms: Option<u64>,
    pub restarts: u64,
    pub rotations: u64,
}

impl Worker {
    pub fn new(id: usize, data_addr: SocketAddr, control_addr: SocketAddr, work_dir: PathBuf) -> Self {
        Self {
            id,
            data_addr,
            control_addr,
            work_dir,
            conn_count: Mutex::new(0),
            alive: AtomicBool::new(false),
            pid: AtomicU32::new(NO_PID),
            latency_ms: AtomicU64::new(NO_LATENCY),
            restarts: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn data_addr(&self) -> SocketAddr {
        self.data_addr
    }

    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Marks the worker as running the process with the given pid.
    pub(crate) fn mark_alive(&self, pid: Option<u32>) {
        self.pid.store(pid.unwrap_or(NO_PID), Ordering::Relaxed);
        self.alive.store(true, Ordering::Release);
    }

    /// Marks the worker's process as exited.
    pub(crate) fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
        self.pid.store(NO_PID, Ordering::Relaxed);
    }

    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::Relaxed) {
            NO_PID => None,
            pid => Some(pid),
        }
    }

    pub fn conn_count(&self) -> usize {
        *self.conn_count.lock()
    }

    /// Takes a session slot if the count still equals what the caller saw
    /// when it picked this worker.
    pub(crate) fn try_claim(&self, observed: usize) -> bool {
        let mut count = self.conn_count.lock();
        if *count != observed {
            return false;
        }
        *count += 1;
        metrics::set_worker_connections(self.id, *count);
        true
    }

    pub(crate) fn claim(&self) {
        let mut count = self.conn_count.lock();
        *count += 1;
        metrics::set_worker_connections(self.id, *count);
    }

    pub(crate) fn release(&self) {
        let mut count = self.conn_count.lock();
        *count = count.saturating_sub(1);
        metrics::set_worker_connections(self.id, *count);
    }

    /// Last health-probe round trip, if any probe has succeeded yet.
    pub fn latency(&self) -> Option<Duration> {
        match self.latency_ms.load(Ordering::Relaxed) {
            NO_LATENCY => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub(crate) fn record_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(NO_LATENCY - 1);
        self.latency_ms.store(ms, Ordering::Relaxed);
        metrics::set_worker_latency(self.id, ms);
    }

    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_restarts(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_rotations(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            data_port: self.data_addr.port(),
            control_port: self.control_addr.port(),
            work_dir: self.work_dir.clone(),
            alive: self.is_alive(),
            pid: self.pid(),
            connections: self.conn_count(),
            latency_ms: self.latency().map(|l| l.as_millis() as u64),
            restarts: self.restarts(),
            rotations: self.rotations(),
        }
    }
}

/// ConnSlot holds one unit of a worker's connection count and gives it
/// back when dropped, whichever way the session ends.
pub struct ConnSlot {
    worker: Arc<Worker>,
}

impl ConnSlot {
    pub(crate) fn new(worker: Arc<Worker>) -> Self {
        Self { worker }
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }
}

impl Drop for ConnSlot {
    fn drop(&mut self) {
        self.worker.release();
    }
}
