//! env_daq command line entry point.
use anyhow::{Context, Result};
use clap::Parser;
use env_daq::config::Settings;
use env_daq::daemon::LoggerDaemon;
use env_daq::hardware::SensorSuite;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Periodic environmental sensor logger writing daily CSV files.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/logger.toml")]
    config: PathBuf,

    /// Use emulated sensors instead of the IIO devices
    #[arg(long)]
    simulate: bool,

    /// Run a single cycle, write it and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    if cli.simulate {
        settings.hardware.backend = "simulated".to_string();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.logger.log_level.as_str())),
        )
        .init();

    info!(
        config = %cli.config.display(),
        data_folder = %settings.logger.data_folder.display(),
        interval_secs = settings.logger.log_interval,
        "starting env_daq"
    );

    let suite = SensorSuite::connect(&settings.hardware).context("Failed to connect sensors")?;
    let mut daemon =
        LoggerDaemon::new(&settings, suite).context("Failed to initialize the logger")?;

    if cli.once {
        let tick = daemon.tick().await;
        daemon.stop().context("Failed to close the journal")?;
        let report = tick.context("Failed to write the row")?;
        for fault in &report.faults {
            warn!(adapter = fault.adapter, metrics = ?fault.metrics, "metric missing");
        }
        info!(present = report.reading.present(), "single cycle complete");
        return Ok(());
    }

    daemon
        .run(shutdown_signal())
        .await
        .context("Failed to close the journal")?;
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
