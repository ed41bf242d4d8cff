//! NetSentry - Network Monitoring Control Shell
//!
//! Headless entry point: wires configuration, logging, the control bridge,
//! and the session controller. Monitoring starts on launch; every
//! `packet-data` payload is printed to stdout as one JSON object per line;
//! Ctrl-C stops the session and terminates the engine before exiting.

use netsentry::bridge::{ControlBridge, ControlCommand};
use netsentry::config::AppConfig;
use netsentry::error::Result;
use netsentry::logging;
use netsentry::session::SessionController;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let (bridge, core) = ControlBridge::new();
    let controller = SessionController::new(&config, core.forwarder);
    let controller_task = tokio::spawn(controller.run(core.commands));

    if let Err(e) = bridge.send_command(ControlCommand::StartMonitoring) {
        tracing::error!(error = %e, "Failed to start monitoring");
    }

    loop {
        for packet in bridge.recv_all_packets() {
            match serde_json::to_string(&packet) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "Unserializable packet"),
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    tracing::info!("Shutting down");
    let _ = bridge.send_command(ControlCommand::StopMonitoring);
    drop(bridge);

    // The controller tears down the feed and the engine on its way out
    let _ = controller_task.await;
    Ok(())
}
