// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn config(dir: &TempDir) -> DaemonConfig {
    let script_root = dir.path().join("scripts");
    std::fs::create_dir_all(&script_root).unwrap();
    std::fs::write(
        script_root.join("signal.csv"),
        "SL_No,Name,Latitude,Longitude\n1,Market Square,12 58 12 N,77 35 40 E\n",
    )
    .unwrap();
    DaemonConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        state_dir: dir.path().join("state"),
        script_root,
        ..DaemonConfig::default()
    }
}

#[tokio::test]
async fn startup_takes_lock_and_shutdown_releases_it() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    let mut daemon = startup(&config).await.unwrap();

    let pid = std::fs::read_to_string(config.lock_path()).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert!(daemon.listener.is_some());
    assert!(config.records_dir().is_dir());
    // No resource directory exists, so nothing is supervised
    assert!(daemon.app.supervisor.lock().await.is_empty());

    daemon.shutdown().await.unwrap();
    assert!(!config.lock_path().exists());
}

#[tokio::test]
async fn second_daemon_on_same_state_dir_is_refused() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let mut first = startup(&config).await.unwrap();

    let err = startup(&config).await.err().unwrap();

    assert!(matches!(err, LifecycleError::LockFailed(_)));
    let pid = std::fs::read_to_string(config.lock_path()).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    first.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_location_source_fails_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.locations = "absent.csv".into();

    let err = startup(&config).await.err().unwrap();

    assert!(matches!(err, LifecycleError::Registry(_)));
    assert!(!config.lock_path().exists());
}

#[tokio::test]
async fn missing_script_root_fails() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.script_root = dir.path().join("nowhere");

    let err = startup(&config).await.err().unwrap();

    assert!(matches!(err, LifecycleError::ScriptRootMissing(_)));
}
