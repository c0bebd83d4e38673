// Package liveness provides Kubernetes liveness probe functionality.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

pub mod error;
pub mod prober;
pub mod service;

pub use error::TimeoutIsTooShortError;
pub use prober::Prober;
pub use service::Service;

const MIN_TIMEOUT: Duration = Duration::from_millis(1);
const FALLBACK_TIMEOUT: Duration = Duration::from_millis(10);

/// Liveness probe over a set of watched services.
pub struct Probe {
    services: RwLock<Vec<Arc<dyn Service>>>,
    timeout: Duration,
}

impl Probe {
    /// Creates a probe; timeouts below 1ms are raised to 10ms.
    pub fn new(timeout_duration: Duration) -> Self {
        let timeout = if timeout_duration < MIN_TIMEOUT {
            warn!(
                component = "liveness",
                error = %TimeoutIsTooShortError,
                "min timeout duration is 1ms (timeout set up as 10ms as a more reasonable value)"
            );
            FALLBACK_TIMEOUT
        } else {
            timeout_duration
        };

        Self {
            services: RwLock::new(Vec::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Asks every watched service off the async threads; an empty set
    /// counts as not alive, since nothing has registered yet.
    pub async fn is_alive_async(&self) -> bool {
        let services = self.services.read().clone();
        if services.is_empty() {
            return false;
        }

        let probe_timeout = self.timeout;
        let check = tokio::task::spawn_blocking(move || {
            services.iter().all(|s| s.is_alive(probe_timeout))
        });

        match timeout(probe_timeout, check).await {
            Ok(Ok(alive)) => alive,
            Ok(Err(err)) => {
                warn!(component = "liveness", error = %err, "liveness check panicked");
                false
            }
            Err(_) => {
                warn!(
                    component = "liveness",
                    timeout = ?probe_timeout,
                    "liveness probe deadline exceeded while checking service"
                );
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl Prober for Probe {
    fn watch(&self, services: Vec<Arc<dyn Service>>) {
        *self.services.write() = services;
    }

    async fn is_alive(&self) -> bool {
        self.is_alive_async().await
    }
}
