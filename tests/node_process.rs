#![cfg(unix)]
//! Keep this file to a single test: it sets a process-wide environment
//! variable and execs a freshly written binary, which races with forks
//! from concurrently running tests.

use std::path::Path;
use std::time::Duration;
use warden::{JsonObjectExt, LifecycleManager, NodeState, WardenSettings};

/// Stands in for the node binary: `init` writes a config, `daemon` reports
/// its arguments and environment, then blocks.
const FAKE_NODE: &str = r#"#!/bin/sh
case "$1" in
  init)
    echo "initializing IPFS node at $IPFS_PATH"
    echo "init warning" >&2
    if [ ! -f "$IPFS_PATH/config" ]; then
      printf '{"Identity": {"PeerID": "QmScript"}}' > "$IPFS_PATH/config"
    fi
    exit 3
    ;;
  daemon)
    echo "args: $*"
    echo "marker=${WARDEN_TEST_MARKER:-unset}"
    echo "Daemon is ready"
    exec /bin/sleep 30
    ;;
esac
exit 1
"#;

fn write_assets(root: &Path) -> std::path::PathBuf {
    let assets = root.join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("arm"), FAKE_NODE).unwrap();
    std::fs::write(assets.join("386"), FAKE_NODE).unwrap();
    assets
}

async fn wait_for_line(manager: &LifecycleManager, needle: &str) -> bool {
    for _ in 0..100 {
        if manager.logs().lines().iter().any(|line| line == needle) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[tokio::test]
async fn node_lifecycle_with_real_process() {
    std::env::set_var("WARDEN_TEST_MARKER", "leaked");

    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path());
    let ipfs_path = dir.path().join("ipfs");
    std::fs::create_dir_all(&ipfs_path).unwrap();

    let settings = WardenSettings {
        data_root: Some(dir.path().to_path_buf()),
        assets_dir: Some(assets),
        abi: Some("x86_64".to_string()),
        stop_timeout_secs: Some(5),
        ..Default::default()
    };
    let manager = LifecycleManager::from_settings(&settings);

    manager.init().await.unwrap();

    let status = manager.status();
    assert_eq!(status.state, NodeState::Running);
    assert_eq!(status.last_init_exit, Some(3));
    let pid = status.pid.expect("daemon pid");

    // init output is complete by the time init() returns
    let lines = manager.logs().lines();
    assert!(lines.contains(&format!("initializing IPFS node at {}", ipfs_path.display())));
    assert!(lines.contains(&"init warning".to_string()));

    assert!(wait_for_line(&manager, "Daemon is ready").await);
    assert!(wait_for_line(&manager, "args: daemon --enable-pubsub-experiment").await);
    assert!(wait_for_line(&manager, "marker=unset").await);

    let mut config = manager.config().read().await.unwrap();
    assert_eq!(
        config.object("Identity").unwrap().string("PeerID"),
        Some("QmScript")
    );
    let headers = config.object("API").unwrap().object("HTTPHeaders").unwrap();
    assert_eq!(
        headers.array("Access-Control-Allow-Origin").unwrap().len(),
        2
    );

    manager.stop().await.unwrap();

    assert_eq!(manager.state(), NodeState::Stopped);
    assert_eq!(manager.status().pid, None);
    assert!(!process_alive(pid));
    assert!(wait_for_line(&manager, "Daemon is ready").await);
}
