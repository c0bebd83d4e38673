use super::{Config, PoolBox};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Creates a new test configuration.
pub fn new_test_config() -> Config {
    Config {
        pool: PoolBox {
            env: super::TEST.to_string(),
            logs: Some(super::Logs {
                level: Some("debug".to_string()),
            }),
            runtime: Some(super::Runtime { num_cpus: 3 }),
            worker: Some(super::Worker {
                // sh -c passes the trailing arguments through as $0..$2.
                binary: Some("sh".to_string()),
                args: Some(vec![
                    "-c".to_string(),
                    "sleep 30".to_string(),
                    "{data_port}".to_string(),
                    "{control_port}".to_string(),
                    "{work_dir}".to_string(),
                ]),
                host: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                base_data_port: Some(39100),
                base_control_port: Some(39200),
                data_dir: Some(std::env::temp_dir().join("torpool-test")),
                restart_delay: Some(Duration::from_millis(200)),
            }),
            balancer: Some(super::Balancer {
                addr: Some("127.0.0.1:0".to_string()),
                dial_timeout: Some(Duration::from_secs(1)),
            }),
            health: Some(super::Health {
                enabled: true,
                interval: Some(Duration::from_secs(30)),
                timeout: Some(Duration::from_secs(3)),
                latency_ceiling: Some(Duration::from_millis(1500)),
            }),
            rotation: Some(super::Rotation {
                enabled: true,
                interval: Some(Duration::from_secs(300)),
                control_timeout: Some(Duration::from_secs(1)),
            }),
            api: Some(super::Api {
                enabled: false,
                name: Some("torpool:8020".to_string()),
                port: Some("8020".to_string()),
            }),
            k8s: Some(super::K8S {
                probe: super::Probe {
                    timeout: Some(Duration::from_secs(5)),
                },
            }),
        },
    }
}

/// Points the test config at a throwaway data directory.
#[allow(dead_code)]
pub fn with_data_dir(mut cfg: Config, dir: PathBuf) -> Config {
    if let Some(worker) = cfg.pool.worker.as_mut() {
        worker.data_dir = Some(dir);
    }
    cfg
}
