//! Prometheus metrics functionality.
//
//! Metrics organization:
//! - Pool metrics: metrics::meter (workers_alive, worker_connections, rotations_total, etc.)
//! - Process metrics: metrics-process (process_resident_memory_bytes, process_cpu_*, etc.)

pub mod meter;

// Re-export commonly used items
pub use meter::*;
