// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! daemon that serves `signal.csv` from the current directory on port 8765.

use cw_core::RestartPolicy;
use cw_engine::{DetectorConfig, InvokerConfig, WorkerConfig};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Gateway listen address
    pub listen: SocketAddr,
    /// Logs, PID lock and record collections
    pub state_dir: PathBuf,
    /// Working directory of every worker
    pub script_root: PathBuf,
    /// Location CSV, relative to `script_root` unless absolute
    pub locations: PathBuf,
    /// Frames buffered per WebSocket subscriber before it is dropped
    pub subscriber_buffer: usize,
    pub signal_worker: SignalWorkerConfig,
    pub route_worker: RouteWorkerConfig,
    pub incident_worker: IncidentWorkerConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8765)),
            state_dir: default_state_dir(),
            script_root: PathBuf::from("."),
            locations: PathBuf::from("signal.csv"),
            subscriber_buffer: 256,
            signal_worker: SignalWorkerConfig::default(),
            route_worker: RouteWorkerConfig::default(),
            incident_worker: IncidentWorkerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalWorkerConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Must exist under `script_root` for a location to be supervised
    pub resource_dir: Option<String>,
    #[serde(with = "humantime_serde")]
    pub restart_cooldown: Duration,
    /// Unset restarts forever
    pub max_restarts: Option<u32>,
}

impl Default for SignalWorkerConfig {
    fn default() -> Self {
        let restart = RestartPolicy::default();
        Self {
            program: "python".to_string(),
            args: vec!["traffic.py".to_string(), "Crossing_{id}".to_string()],
            resource_dir: Some("All_Crossings/Crossing_{id}/Lanes".to_string()),
            restart_cooldown: restart.cooldown,
            max_restarts: restart.max_restarts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteWorkerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub input_artifact: PathBuf,
    pub result_artifact: PathBuf,
}

impl Default for RouteWorkerConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["mainAlgo.py".to_string()],
            input_artifact: PathBuf::from("routeSignal.csv"),
            result_artifact: PathBuf::from("fastest_route.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncidentWorkerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for IncidentWorkerConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["detect_accident.py".to_string(), "{image}".to_string()],
        }
    }
}

impl DaemonConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn locations_path(&self) -> PathBuf {
        self.script_root.join(&self.locations)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("crosswayd.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("crosswayd.log")
    }

    pub fn records_dir(&self) -> PathBuf {
        self.state_dir.join("records")
    }

    pub fn worker_config(&self) -> WorkerConfig {
        let worker = &self.signal_worker;
        let mut config = WorkerConfig::new(&self.script_root, worker.program.clone())
            .args(worker.args.clone())
            .restart(RestartPolicy {
                cooldown: worker.restart_cooldown,
                max_restarts: worker.max_restarts,
            });
        if let Some(dir) = &worker.resource_dir {
            config = config.resource_dir(dir.clone());
        }
        config
    }

    pub fn invoker_config(&self) -> InvokerConfig {
        let route = &self.route_worker;
        InvokerConfig::new(&self.script_root, route.program.clone())
            .args(route.args.clone())
            .artifacts(route.input_artifact.clone(), route.result_artifact.clone())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        let incident = &self.incident_worker;
        DetectorConfig::new(&self.script_root, incident.program.clone())
            .args(incident.args.clone())
    }
}

/// `$XDG_STATE_HOME/crossway`, falling back to `~/.local/state/crossway`
fn default_state_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("crossway");
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/state/crossway"),
        Err(_) => PathBuf::from(".crossway"),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
