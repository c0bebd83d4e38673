//! Scheduled circuit rotation.

pub mod scheduler;

#[cfg(test)]
mod scheduler_test;

// Re-export main types
pub use scheduler::RotationScheduler;
