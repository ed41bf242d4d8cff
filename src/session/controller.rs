//! Session Controller
//!
//! Coordinates the engine supervisor and the feed connector behind a
//! start/stop surface, and owns the session state machine:
//!
//! ```text
//! Idle -> Starting -> Connected <-> Reconnecting -> (stop) Idle
//! ```
//!
//! The controller runs as a single task multiplexing control commands and
//! feed updates, so start/stop requests are serialized against feed events
//! and no locking is needed anywhere in the session.

use crate::bridge::{ControlCommand, EventForwarder};
use crate::config::AppConfig;
use crate::engine::EngineSupervisor;
use crate::feed::{FeedConnector, FeedUpdate};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No engine, no connection; ready to start
    #[default]
    Idle,
    /// Engine spawned, connection forming
    Starting,
    /// Feed live
    Connected,
    /// Feed dropped, refusal retry cycle engaged
    Reconnecting,
}

/// The singleton session: engine process + feed connection + state.
pub struct SessionController {
    /// Unique id for this application run
    session_id: Uuid,
    state: SessionState,
    supervisor: EngineSupervisor,
    connector: FeedConnector,
    forwarder: EventForwarder,
    updates_tx: mpsc::UnboundedSender<FeedUpdate>,
    updates_rx: Option<mpsc::UnboundedReceiver<FeedUpdate>>,
}

impl SessionController {
    /// Create the session in `Idle` state.
    pub fn new(config: &AppConfig, forwarder: EventForwarder) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        Self {
            session_id: Uuid::new_v4(),
            state: SessionState::Idle,
            supervisor: EngineSupervisor::new(config.engine.clone()),
            connector: FeedConnector::new(config.feed.clone()),
            forwarder,
            updates_tx,
            updates_rx: Some(updates_rx),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session id for this run
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether an engine process handle is live
    pub fn is_engine_running(&self) -> bool {
        self.supervisor.is_running()
    }

    /// OS pid of the live engine, if any
    pub fn engine_pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    /// Start the monitoring session: spawn the engine, then schedule the
    /// feed connection.
    ///
    /// No-op unless `Idle` (idempotency guarantee). A failed spawn is
    /// logged, not propagated: it surfaces downstream as refusal retries.
    pub fn start_session(&mut self) {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "start_session while active is a no-op");
            return;
        }

        info!(session_id = %self.session_id, "Starting monitoring session");
        self.transition(SessionState::Starting);

        if let Err(e) = self.supervisor.spawn() {
            warn!(error = %e, "Engine spawn failed; the feed retry cycle will surface it");
        }
        self.connector.connect(self.updates_tx.clone());
    }

    /// Stop the monitoring session and return to `Idle`.
    ///
    /// No-op when already `Idle`. The connection comes down before the
    /// process it depends on, so teardown produces no spurious error events.
    pub fn stop_session(&mut self) {
        if self.state == SessionState::Idle {
            debug!("stop_session while idle is a no-op");
            return;
        }

        self.connector.disconnect();
        self.supervisor.terminate();
        self.transition(SessionState::Idle);
        info!(session_id = %self.session_id, "Monitoring session stopped");
    }

    /// Apply one connector update: advance the state machine and forward
    /// the payload to the presentation layer.
    pub fn handle_update(&mut self, update: FeedUpdate) {
        // An aborted connector can leave already-queued updates behind;
        // once the session is Idle they are stale and must not resurrect it.
        if self.state == SessionState::Idle {
            debug!(?update, "Stale feed update after stop, ignoring");
            return;
        }

        match update {
            FeedUpdate::Opened { notice } => {
                self.transition(SessionState::Connected);
                self.forwarder.forward(notice);
            }
            FeedUpdate::Retrying { notice } => {
                if self.state == SessionState::Connected {
                    self.transition(SessionState::Reconnecting);
                }
                self.forwarder.forward(notice);
            }
            FeedUpdate::Event(event) => self.forwarder.forward(event),
            FeedUpdate::Closed => {
                debug!(state = ?self.state, "Feed went idle");
            }
        }
    }

    fn transition(&mut self, to: SessionState) {
        debug!(from = ?self.state, to = ?to, "Session state transition");
        self.state = to;
    }

    /// Run the controller loop until the command channel closes.
    ///
    /// All session mutations happen on this one task; overlapping start and
    /// stop requests are processed strictly in arrival order.
    pub async fn run(mut self, mut commands: mpsc::Receiver<ControlCommand>) {
        let Some(mut updates_rx) = self.updates_rx.take() else {
            return;
        };

        info!(session_id = %self.session_id, "Session controller started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ControlCommand::StartMonitoring) => self.start_session(),
                    Some(ControlCommand::StopMonitoring) => self.stop_session(),
                    None => break,
                },
                update = updates_rx.recv() => {
                    if let Some(update) = update {
                        self.handle_update(update);
                    }
                }
            }
        }

        // Application shutdown: connection first, then the engine
        self.stop_session();
        info!("Session controller stopped");
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
