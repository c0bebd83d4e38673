// Metric name constants
pub const WORKERS_TOTAL: &str = "workers_total";
pub const WORKERS_ALIVE: &str = "workers_alive";
pub const WORKER_CONNECTIONS: &str = "worker_connections";
pub const WORKER_LATENCY_MS: &str = "worker_latency_ms";
pub const WORKER_RESTARTS: &str = "worker_restarts_total";
pub const WORKER_LAUNCH_FAILURES: &str = "worker_launch_failures_total";

pub const ROTATIONS: &str = "rotations_total";
pub const ROTATION_FAILURES: &str = "rotation_failures_total";

pub const BALANCER_SESSIONS: &str = "balancer_sessions_total";
pub const BALANCER_DIAL_FAILURES: &str = "balancer_dial_failures_total";
pub const BALANCER_BYTES: &str = "balancer_bytes_total";

/// Why a rotation directive was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    Scheduled,
    Latency,
    Manual,
}

impl RotationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RotationReason::Scheduled => "scheduled",
            RotationReason::Latency => "latency",
            RotationReason::Manual => "manual",
        }
    }
}

/// Sets the configured pool size.
pub fn set_workers_total(n: usize) {
    ::metrics::gauge!(WORKERS_TOTAL).set(n as f64);
}

/// Sets the number of workers with a running process.
pub fn set_workers_alive(n: usize) {
    ::metrics::gauge!(WORKERS_ALIVE).set(n as f64);
}

/// Sets the active session count of one worker.
pub fn set_worker_connections(worker: usize, n: usize) {
    ::metrics::gauge!(WORKER_CONNECTIONS, "worker" => worker.to_string()).set(n as f64);
}

/// Sets the last observed probe latency of one worker.
pub fn set_worker_latency(worker: usize, ms: u64) {
    ::metrics::gauge!(WORKER_LATENCY_MS, "worker" => worker.to_string()).set(ms as f64);
}

/// Counts one process restart.
pub fn inc_worker_restarts(worker: usize) {
    ::metrics::counter!(WORKER_RESTARTS, "worker" => worker.to_string()).increment(1);
}

/// Counts one failed process launch.
pub fn inc_worker_launch_failures(worker: usize) {
    ::metrics::counter!(WORKER_LAUNCH_FAILURES, "worker" => worker.to_string()).increment(1);
}

/// Counts one delivered rotation directive.
pub fn inc_rotations(reason: RotationReason) {
    ::metrics::counter!(ROTATIONS, "reason" => reason.as_str()).increment(1);
}

/// Counts one undeliverable rotation directive.
pub fn inc_rotation_failures() {
    ::metrics::counter!(ROTATION_FAILURES).increment(1);
}

/// Counts one client session routed to a worker.
pub fn inc_sessions(worker: usize) {
    ::metrics::counter!(BALANCER_SESSIONS, "worker" => worker.to_string()).increment(1);
}

/// Counts one failed dial to a worker's data channel.
pub fn inc_dial_failures(worker: usize) {
    ::metrics::counter!(BALANCER_DIAL_FAILURES, "worker" => worker.to_string()).increment(1);
}

/// Adds proxied bytes; direction is "upstream" (client to worker) or "downstream".
pub fn add_bytes(direction: &'static str, n: u64) {
    ::metrics::counter!(BALANCER_BYTES, "direction" => direction).increment(n);
}
