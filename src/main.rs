// Main entrypoint for the torpool application.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use torpool::app::App;
use torpool::config::{Config, ConfigTrait};
use torpool::shutdown::GracefulShutdown;
use torpool::{dedlog, liveness, metrics_runtime};

const CONFIG_PATH: &str = "cfg/torpool.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/torpool.cfg.local.yaml";
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// torpool - supervised pool of anonymizing proxies behind one TCP balancer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Logs how the pool size was derived.
fn log_pool_size(cfg: &Config) {
    let configured = cfg.num_cpus();
    if configured == 0 {
        info!(
            component = "main",
            event = "pool_size_configured",
            workers = cfg.pool_size(),
            "pool size follows available cores"
        );
    } else {
        warn!(
            component = "main",
            event = "pool_size_configured",
            workers = configured,
            available_cores = num_cpus::get(),
            "pool size set explicitly"
        );
    }
}

/// Loads the configuration; a local override is tried before the default.
fn load_cfg(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, custom_path));
    }

    match Config::load(CONFIG_PATH_LOCAL) {
        Ok(cfg) => Ok((cfg, PathBuf::from(CONFIG_PATH_LOCAL))),
        Err(_) => {
            let cfg = Config::load(CONFIG_PATH)
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            Ok((cfg, PathBuf::from(CONFIG_PATH)))
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_deref())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The recorder must be installed before the runtime exists.
    if let Err(e) = metrics_runtime::init_metrics() {
        eprintln!("Warning: failed to initialize Prometheus metrics: {}", e);
        eprintln!("Metrics endpoint will not be available");
    }

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let (cfg, cfg_path) = load_cfg(args.cfg)?;
    configure_logger(&cfg);
    info!(component = "config", event = "load_success", path = ?cfg_path, "config loaded");
    log_pool_size(&cfg);

    let dedup_logger_token = shutdown_token.clone();
    tokio::spawn(async move {
        dedlog::start_dedup_logger(dedup_logger_token).await;
    });

    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone());
    graceful_shutdown.set_graceful_timeout(GRACEFUL_TIMEOUT);

    let probe_timeout = cfg
        .k8s()
        .and_then(|k8s| k8s.probe.timeout)
        .unwrap_or(DEFAULT_PROBE_TIMEOUT);
    let probe = Arc::new(liveness::Probe::new(probe_timeout)) as Arc<dyn liveness::Prober>;

    let app = App::new(shutdown_token.clone(), cfg, probe)?;

    graceful_shutdown.add(1);
    let gsh = graceful_shutdown.clone();
    let app_token = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = app.serve().await {
            error!(
                component = "main",
                scope = "app",
                event = "start_failed",
                error = %e,
                "failed to start app"
            );
            // Nothing is serving; bring the process down.
            app_token.cancel();
        }
        gsh.done();
    });

    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
