// HTTP API controllers for pool administration endpoints.

pub mod config;
pub mod controller;
pub mod metrics;
pub mod probe;
pub mod rotate;
pub mod workers;

pub use config::ShowConfigController;
pub use metrics::PrometheusMetricsController;
pub use probe::LivenessProbeController;
pub use rotate::RotateController;
pub use workers::WorkersController;
