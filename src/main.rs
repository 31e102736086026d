//! galle-bouncer - Keeps a Galle ban list in sync with CrowdSec decisions
//!
//! This is the main entry point for the galle-bouncer application.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use galle_bouncer::config::{Config, SyncConfig};
use galle_bouncer::error::AppError;
use galle_bouncer::otel::{init_tracing, Metrics, OtelProvider};
use galle_bouncer::plugins::sink::GalleSink;
use galle_bouncer::plugins::source::{CrowdSecConfig, CrowdSecStreamClient};
use galle_bouncer::sync::{HttpClient, SchedulerConfig, SyncScheduler};

/// galle-bouncer - Keeps a Galle ban list in sync with CrowdSec decisions
#[derive(Parser, Debug)]
#[command(name = "galle-bouncer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(env = "GALLE_BOUNCER_CONFIG", required_unless_present = "print_config")]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Validate the configuration file and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_config {
        print!("{}", Config::example());
        return ExitCode::SUCCESS;
    }

    let Some(path) = args.config else {
        eprintln!("No configuration file given");
        return ExitCode::FAILURE;
    };

    // Nothing touches the network before the configuration is valid
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.validate {
        eprintln!("Configuration is valid: {}", path.display());
        return ExitCode::SUCCESS;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "galle-bouncer stopped");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load and validate the configuration file
fn load_config(path: &Path) -> Result<SyncConfig, AppError> {
    // Use eprintln! since tracing is not yet initialized
    eprintln!("Loading configuration from file: {}", path.display());
    let config = Config::from_file(path)?.validate()?;
    Ok(config)
}

/// Wire the bouncer together and run it until shutdown or a fatal error
async fn run(config: SyncConfig) -> anyhow::Result<()> {
    let otel_provider = OtelProvider::new(&config.otel).map_err(AppError::from)?;
    init_tracing(&otel_provider, config.log_level, config.log_format)
        .map_err(AppError::from)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.log_level,
        otel_enabled = otel_provider.is_enabled(),
        "Starting bouncer"
    );

    let metrics = Metrics::new(&otel_provider.meter());

    let http = HttpClient::new(config.http.clone())
        .map_err(AppError::from)
        .context("Failed to build HTTP client")?;

    let source = Arc::new(CrowdSecStreamClient::new(
        CrowdSecConfig::from(&config),
        http.clone(),
    ));
    let sink = Arc::new(GalleSink::new(config.galle_control_url.clone(), http));

    info!(
        lapi_url = %config.crowdsec_lapi_url,
        galle_url = %config.galle_control_url,
        poll_interval_secs = config.poll_interval.as_secs(),
        "Bouncer configured"
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    let scheduler = SyncScheduler::new(
        SchedulerConfig::from(&config),
        source.clone(),
        sink,
        shutdown_rx,
    )
    .with_metrics(metrics);

    let result = scheduler.run().await;

    source.shutdown();
    if let Err(e) = otel_provider.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("galle-bouncer shutdown complete");

    result.map_err(AppError::from)?;
    Ok(())
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
