// Periodic background workers sharing the pool.

pub mod health;
pub mod rotation;
pub mod telemetry;

// Re-export main types
pub use health::{HealthMonitor, LatencyProbe, TcpProbe};
pub use rotation::RotationScheduler;
