// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const TEST: &str = "test";

/// Placeholders substituted into `worker.args` per worker.
pub const DATA_PORT_PLACEHOLDER: &str = "{data_port}";
pub const CONTROL_PORT_PLACEHOLDER: &str = "{control_port}";
pub const WORK_DIR_PLACEHOLDER: &str = "{work_dir}";

const DEFAULT_BINARY: &str = "tor";
const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const DEFAULT_BASE_DATA_PORT: u16 = 9100;
const DEFAULT_BASE_CONTROL_PORT: u16 = 9200;
const DEFAULT_DATA_DIR: &str = "/var/lib/torpool";
const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_BALANCER_ADDR: &str = "0.0.0.0:10000";
const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_LATENCY_CEILING: Duration = Duration::from_millis(1500);
const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorPool {
    #[serde(rename = "pool")]
    pub pool: PoolBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub runtime: Option<Runtime>,
    pub worker: Option<Worker>,
    pub balancer: Option<Balancer>,
    pub health: Option<Health>,
    pub rotation: Option<Rotation>,
    pub api: Option<Api>,
    pub k8s: Option<K8S>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runtime {
    /// Number of workers, 0 means one per available core.
    pub num_cpus: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Worker {
    pub binary: Option<String>,
    pub args: Option<Vec<String>>,
    pub host: Option<IpAddr>,
    #[serde(rename = "base_data_port")]
    pub base_data_port: Option<u16>,
    #[serde(rename = "base_control_port")]
    pub base_control_port: Option<u16>,
    #[serde(rename = "data_dir")]
    pub data_dir: Option<PathBuf>,
    #[serde(rename = "restart_delay", default, with = "humantime_serde")]
    pub restart_delay: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Balancer {
    pub addr: Option<String>,
    #[serde(rename = "dial_timeout", default, with = "humantime_serde")]
    pub dial_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Health {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(rename = "latency_ceiling", default, with = "humantime_serde")]
    pub latency_ceiling: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rotation {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    #[serde(rename = "control_timeout", default, with = "humantime_serde")]
    pub control_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub name: Option<String>,
    pub port: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Probe {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct K8S {
    pub probe: Probe,
}

fn enabled_by_default() -> bool {
    true
}

/// Resolved worker launch and addressing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLayout {
    pub binary: String,
    pub args: Vec<String>,
    pub host: IpAddr,
    pub base_data_port: u16,
    pub base_control_port: u16,
    pub data_dir: PathBuf,
    pub restart_delay: Duration,
}

impl WorkerLayout {
    /// Data-channel port of the worker with the given 1-based id.
    pub fn data_port(&self, id: usize) -> Option<u16> {
        offset_port(self.base_data_port, id)
    }

    /// Control-channel port of the worker with the given 1-based id.
    pub fn control_port(&self, id: usize) -> Option<u16> {
        offset_port(self.base_control_port, id)
    }

    /// Private working directory of the worker with the given 1-based id.
    pub fn work_dir(&self, id: usize) -> PathBuf {
        self.data_dir.join(id.to_string())
    }
}

fn offset_port(base: u16, id: usize) -> Option<u16> {
    u16::try_from(id).ok().and_then(|id| base.checked_add(id))
}

fn default_args() -> Vec<String> {
    vec![
        "--SocksPort".to_string(),
        DATA_PORT_PLACEHOLDER.to_string(),
        "--ControlPort".to_string(),
        CONTROL_PORT_PLACEHOLDER.to_string(),
        "--DataDirectory".to_string(),
        WORK_DIR_PLACEHOLDER.to_string(),
    ]
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_dev(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    /// Requested pool size, 0 when it should follow the core count.
    fn num_cpus(&self) -> usize;
    /// Effective pool size.
    fn pool_size(&self) -> usize;
    fn worker_layout(&self) -> WorkerLayout;
    fn balancer_addr(&self) -> String;
    fn dial_timeout(&self) -> Duration;
    fn health(&self) -> Option<&Health>;
    fn health_interval(&self) -> Duration;
    fn health_timeout(&self) -> Duration;
    fn latency_ceiling(&self) -> Duration;
    fn rotation(&self) -> Option<&Rotation>;
    fn rotation_interval(&self) -> Duration;
    fn control_timeout(&self) -> Duration;
    fn api(&self) -> Option<&Api>;
    fn k8s(&self) -> Option<&K8S>;
}

// Config type alias for convenience
pub type Config = TorPool;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.pool.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.pool.env == PROD
    }

    fn is_dev(&self) -> bool {
        self.pool.env == DEV
    }

    fn is_test(&self) -> bool {
        self.pool.env == TEST
    }

    fn num_cpus(&self) -> usize {
        self.pool.runtime.as_ref().map(|r| r.num_cpus).unwrap_or(0)
    }

    fn pool_size(&self) -> usize {
        match self.num_cpus() {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    fn worker_layout(&self) -> WorkerLayout {
        let worker = self.pool.worker.as_ref();
        WorkerLayout {
            binary: worker
                .and_then(|w| w.binary.clone())
                .unwrap_or_else(|| DEFAULT_BINARY.to_string()),
            args: worker
                .and_then(|w| w.args.clone())
                .unwrap_or_else(default_args),
            host: worker.and_then(|w| w.host).unwrap_or(DEFAULT_HOST),
            base_data_port: worker
                .and_then(|w| w.base_data_port)
                .unwrap_or(DEFAULT_BASE_DATA_PORT),
            base_control_port: worker
                .and_then(|w| w.base_control_port)
                .unwrap_or(DEFAULT_BASE_CONTROL_PORT),
            data_dir: worker
                .and_then(|w| w.data_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            restart_delay: worker
                .and_then(|w| w.restart_delay)
                .unwrap_or(DEFAULT_RESTART_DELAY),
        }
    }

    fn balancer_addr(&self) -> String {
        self.pool
            .balancer
            .as_ref()
            .and_then(|b| b.addr.clone())
            .unwrap_or_else(|| DEFAULT_BALANCER_ADDR.to_string())
    }

    fn dial_timeout(&self) -> Duration {
        self.pool
            .balancer
            .as_ref()
            .and_then(|b| b.dial_timeout)
            .unwrap_or(DEFAULT_DIAL_TIMEOUT)
    }

    fn health(&self) -> Option<&Health> {
        self.pool.health.as_ref()
    }

    fn health_interval(&self) -> Duration {
        self.health()
            .and_then(|h| h.interval)
            .unwrap_or(DEFAULT_HEALTH_INTERVAL)
    }

    fn health_timeout(&self) -> Duration {
        self.health()
            .and_then(|h| h.timeout)
            .unwrap_or(DEFAULT_HEALTH_TIMEOUT)
    }

    fn latency_ceiling(&self) -> Duration {
        self.health()
            .and_then(|h| h.latency_ceiling)
            .unwrap_or(DEFAULT_LATENCY_CEILING)
    }

    fn rotation(&self) -> Option<&Rotation> {
        self.pool.rotation.as_ref()
    }

    fn rotation_interval(&self) -> Duration {
        self.rotation()
            .and_then(|r| r.interval)
            .unwrap_or(DEFAULT_ROTATION_INTERVAL)
    }

    fn control_timeout(&self) -> Duration {
        self.rotation()
            .and_then(|r| r.control_timeout)
            .unwrap_or(DEFAULT_CONTROL_TIMEOUT)
    }

    fn api(&self) -> Option<&Api> {
        self.pool.api.as_ref()
    }

    fn k8s(&self) -> Option<&K8S> {
        self.pool.k8s.as_ref()
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::from_yaml(&data).with_context(|| format!("load config from {:?}", abs_path))
    }

    /// Parses and validates configuration from a YAML document.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: TorPool = serde_yaml::from_str(data).context("unmarshal yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let size = self.pool_size();
        let layout = self.worker_layout();

        // Ids are 1-based, so the last worker owns base + size.
        let last_data = layout
            .data_port(size)
            .with_context(|| format!("worker.base_data_port overflows for {} workers", size))?;
        let last_control = layout
            .control_port(size)
            .with_context(|| format!("worker.base_control_port overflows for {} workers", size))?;

        let data_range = (layout.base_data_port + 1)..=last_data;
        let control_range = (layout.base_control_port + 1)..=last_control;
        if data_range.start() <= control_range.end() && control_range.start() <= data_range.end() {
            anyhow::bail!(
                "data ports {:?} and control ports {:?} overlap",
                data_range,
                control_range
            );
        }

        for placeholder in [
            DATA_PORT_PLACEHOLDER,
            CONTROL_PORT_PLACEHOLDER,
            WORK_DIR_PLACEHOLDER,
        ] {
            if !layout.args.iter().any(|arg| arg.contains(placeholder)) {
                anyhow::bail!("worker.args must reference {}", placeholder);
            }
        }

        self.balancer_addr()
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid balancer.addr {:?}", self.balancer_addr()))?;

        for (name, value) in [
            ("balancer.dial_timeout", self.dial_timeout()),
            ("health.interval", self.health_interval()),
            ("health.timeout", self.health_timeout()),
            ("rotation.interval", self.rotation_interval()),
            ("rotation.control_timeout", self.control_timeout()),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }

        Ok(())
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::{new_test_config, with_data_dir};
