// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crossway Daemon (crosswayd)
//!
//! Supervises signal workers, runs route and incident computations on
//! demand, and fans their results out to WebSocket subscribers.

use std::future::IntoFuture;
use std::path::PathBuf;

use clap::Parser;
use cw_daemon::{lifecycle, router, DaemonConfig, LifecycleError};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "crosswayd", version, about = "Crossway signal daemon")]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };

    // Write startup marker to log (before tracing setup, so operators can find it)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!(
        "Starting crosswayd with script root {}",
        config.script_root.display()
    );

    // Start daemon
    let mut daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let listener = daemon.listener.take().ok_or("gateway listener already taken")?;
    let stop = CancellationToken::new();
    let mut server = tokio::spawn(
        axum::serve(listener, router(daemon.app.clone()))
            .with_graceful_shutdown(stop.clone().cancelled_owned())
            .into_future(),
    );

    info!("Daemon ready, listening on {}", config.listen);

    tokio::select! {
        // Graceful shutdown on SIGTERM
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),

        // Graceful shutdown on SIGINT
        _ = sigint.recv() => info!("Received SIGINT, shutting down..."),

        result = &mut server => {
            match result {
                Ok(Ok(())) => error!("Gateway stopped unexpectedly"),
                Ok(Err(e)) => error!("Gateway failed: {}", e),
                Err(e) => error!("Gateway task failed: {}", e),
            }
        }
    }

    stop.cancel();
    if !server.is_finished() {
        if let Err(e) = server.await {
            error!("Gateway task failed: {}", e);
        }
    }
    daemon.shutdown().await?;

    info!("Daemon stopped");
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- crosswayd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- crosswayd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &DaemonConfig) -> Result<(), LifecycleError> {
    use std::io::Write;

    std::fs::create_dir_all(&config.state_dir)?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
/// This keeps the error visible even if the process exits quickly.
fn write_startup_error(config: &DaemonConfig, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &DaemonConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.state_dir)?;

    let file_appender = tracing_appender::rolling::never(&config.state_dir, "crosswayd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
