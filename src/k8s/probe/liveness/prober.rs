// Package liveness provides the Prober trait for liveness checking.

use std::sync::Arc;

use super::Service;

/// Prober aggregates the liveness of registered services.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Registers the services to check, replacing any previous set.
    fn watch(&self, services: Vec<Arc<dyn Service>>);

    /// True only if every watched service answered alive in time.
    async fn is_alive(&self) -> bool;
}
