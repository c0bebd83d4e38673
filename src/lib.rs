#[path = "shared/dedlog/mod.rs"]
pub mod dedlog;
#[path = "k8s/probe/liveness/mod.rs"]
pub mod liveness;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod app;
pub mod config;
pub mod control;
pub mod controller;
pub mod http;
pub mod metrics;
pub mod metrics_runtime;
pub mod pool;
pub mod router;
pub mod shutdown;
pub mod supervisor;
pub mod workers;
