// Service trait for liveness checking

use std::time::Duration;

/// Anything the liveness probe can ask whether it is still serving.
pub trait Service: Send + Sync {
    /// Must answer within `timeout`; the probe treats a late answer as dead.
    fn is_alive(&self, timeout: Duration) -> bool;
}
