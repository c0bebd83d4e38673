//! Worker pool: descriptors, least-loaded selection and session slots.

pub mod pool;
pub mod worker;

#[cfg(test)]
mod pool_test;

// Re-export main types
pub use pool::{pick_least_loaded, Candidate, Pool};
pub use worker::{ConnSlot, Worker, WorkerStats};
