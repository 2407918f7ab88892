use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use warden::{Dispatch, LifecycleManager, WardenSettings};

/// Hosts one node: starts it, echoes its output, and takes lifecycle actions
/// from stdin until `exit` or Ctrl+C.
pub(crate) async fn cmd_serve(settings: &WardenSettings) -> Result<()> {
    let manager = Arc::new(LifecycleManager::from_settings(settings));
    let printer = tokio::spawn(print_node_lines(manager.logs().subscribe()));

    if let Err(e) = manager.init().await {
        error!("Node failed to start ({}): {}", e.slug(), e);
    }

    let mut actions = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = actions.next_line(), if stdin_open => match line {
                Ok(Some(action)) => match manager.dispatch(&action).await {
                    Ok(Dispatch::Exit) => break,
                    Ok(Dispatch::Continue) => {}
                    Err(e) => error!("'{}' failed ({}): {}", action.trim(), e.slug(), e),
                },
                Ok(None) => {
                    info!("stdin closed, node keeps running until Ctrl+C");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read lifecycle actions: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping node");
                if let Err(e) = manager.stop().await {
                    error!("Failed to stop node ({}): {}", e.slug(), e);
                }
                break;
            }
        }
    }

    printer.abort();
    // The daemon is stopped. Exit directly: a pending stdin read would keep
    // the runtime from shutting down.
    std::process::exit(0)
}

async fn print_node_lines(mut lines: broadcast::Receiver<String>) {
    loop {
        match lines.recv().await {
            Ok(line) => println!("{}", line),
            Err(RecvError::Lagged(skipped)) => warn!("Skipped {} node log lines", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
