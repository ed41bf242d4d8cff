//! Control bridge between the presentation layer and the session core
//!
//! The presentation side (a synchronous UI thread) talks to the async core
//! over two channels: a command channel carrying `start-monitoring` /
//! `stop-monitoring`, and the `packet-data` channel carrying one structured
//! payload per feed message. Delivery on `packet-data` is fire-and-forget;
//! once the presentation side is torn down, forwarding becomes a silent
//! no-op.

use crate::feed::FeedEvent;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Commands the presentation layer can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlCommand {
    /// Start the engine and open the feed (`start-monitoring`)
    StartMonitoring,
    /// Close the feed and terminate the engine (`stop-monitoring`)
    StopMonitoring,
}

/// Presentation-side half of the bridge.
pub struct ControlBridge {
    /// Sender for control commands
    command_tx: tokio::sync::mpsc::Sender<ControlCommand>,

    /// Receiver for `packet-data` payloads
    packet_rx: std::sync::mpsc::Receiver<FeedEvent>,
}

impl ControlBridge {
    /// Create a new bridge.
    ///
    /// Returns the bridge (for the UI) and the core half (for the session
    /// controller task).
    pub fn new() -> (Self, BridgeCore) {
        let (command_tx, command_rx) = tokio::sync::mpsc::channel(32);
        let (packet_tx, packet_rx) = std::sync::mpsc::channel();

        let bridge = ControlBridge {
            command_tx,
            packet_rx,
        };

        let core = BridgeCore {
            commands: command_rx,
            forwarder: EventForwarder { packet_tx },
        };

        (bridge, core)
    }

    /// Send a control command
    pub fn send_command(&self, command: ControlCommand) -> Result<(), String> {
        self.command_tx
            .try_send(command)
            .map_err(|e| format!("Failed to send command: {}", e))
    }

    /// Try to receive one `packet-data` payload (non-blocking)
    pub fn try_recv_packet(&self) -> Option<FeedEvent> {
        self.packet_rx.try_recv().ok()
    }

    /// Receive all pending `packet-data` payloads
    pub fn recv_all_packets(&self) -> Vec<FeedEvent> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.packet_rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    /// Blocking receive of the next `packet-data` payload, for headless use
    pub fn recv_packet(&self) -> Option<FeedEvent> {
        self.packet_rx.recv().ok()
    }

    /// Blocking receive with a timeout
    pub fn recv_packet_timeout(&self, timeout: std::time::Duration) -> Option<FeedEvent> {
        self.packet_rx.recv_timeout(timeout).ok()
    }
}

/// Core-side half of the bridge.
pub struct BridgeCore {
    /// Receiver for control commands
    pub commands: tokio::sync::mpsc::Receiver<ControlCommand>,

    /// Forwarder for `packet-data` payloads
    pub forwarder: EventForwarder,
}

/// Delivers feed events to the presentation layer, verbatim and in order.
#[derive(Clone)]
pub struct EventForwarder {
    packet_tx: std::sync::mpsc::Sender<FeedEvent>,
}

impl EventForwarder {
    /// Forward one event over `packet-data`.
    ///
    /// Fire-and-forget: if the presentation side has been torn down the
    /// event is dropped silently.
    pub fn forward(&self, event: FeedEvent) {
        if self.packet_tx.send(event).is_err() {
            trace!("Presentation layer gone, dropping packet-data event");
        }
    }
}

impl std::fmt::Debug for EventForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventForwarder").finish_non_exhaustive()
    }
}
