//! Health monitoring of worker data channels.

pub mod monitor;
pub mod probe;


// Re-export main types
pub use monitor::HealthMonitor;
pub use probe::{LatencyProbe, TcpProbe};
