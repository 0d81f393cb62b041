// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use cw_adapters::{SystemProcessAdapter, TracedProcessAdapter};
use cw_core::RegistryError;
use cw_storage::{JsonlStore, StoreError};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::DaemonConfig;
use crate::server::AppState;

/// Process adapter used by the running daemon
pub type DaemonAdapter = TracedProcessAdapter<SystemProcessAdapter>;

/// Daemon state during operation
pub struct DaemonState {
    pub config: DaemonConfig,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Gateway listener, taken by the serve loop
    pub listener: Option<TcpListener>,
    pub app: AppState<DaemonAdapter>,
    pub start_time: Instant,
}

impl DaemonState {
    /// Stop every worker and release the lock
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop workers; each process is gone before this returns
        self.app.supervisor.lock().await.shutdown_all().await;

        // 2. Remove PID file (lock is released when lock_file drops)
        let lock_path = self.config.lock_path();
        if lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Daemon shutdown complete"
        );
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Script root not found at {0}")]
    ScriptRootMissing(PathBuf),

    #[error("Failed to load locations: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to open record store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to bind gateway at {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &DaemonConfig) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // The lock belongs to the daemon that is already running
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &DaemonConfig) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races. Not truncated until
    //    the lock is held, so a running daemon's PID survives a failed attempt.
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(config.lock_path())?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Validate inputs before binding (fail fast, don't accept connections if invalid)
    if !config.script_root.is_dir() {
        return Err(LifecycleError::ScriptRootMissing(config.script_root.clone()));
    }
    let store = JsonlStore::open(config.records_dir())?;
    let adapter = TracedProcessAdapter::new(SystemProcessAdapter::new());
    let app = AppState::from_config(config, adapter, Arc::new(store));
    let locations = app.registry.load()?;

    // 4. Bind (only after all validation passes)
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.listen, e))?;

    // 5. Start one worker per location that has its resources
    let started = app.supervisor.lock().await.supervise_all(locations).await;

    info!(
        workers = started,
        script_root = %config.script_root.display(),
        "Daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener: Some(listener),
        app,
        start_time: Instant::now(),
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &DaemonConfig) {
    let lock_path = config.lock_path();
    if lock_path.exists() {
        let _ = std::fs::remove_file(&lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
