//! Engine Process Supervisor
//!
//! Spawns and terminates the external monitoring engine. The supervisor owns
//! the only handle to the engine process: at most one engine is ever live,
//! and all interaction with it goes through this type.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Engine binary file name (platform-specific)
#[cfg(windows)]
const ENGINE_BINARY: &str = "netsentry-engine.exe";
#[cfg(not(windows))]
const ENGINE_BINARY: &str = "netsentry-engine";

/// Supervises the external monitoring engine process.
pub struct EngineSupervisor {
    config: EngineConfig,
    child: Option<Child>,
}

impl EngineSupervisor {
    /// Create a supervisor; no process is spawned until [`spawn`](Self::spawn).
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }

    /// Whether an engine process handle is currently held.
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// OS process id of the live engine, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Launch the engine process.
    ///
    /// Idempotent: if an engine is already live this is a no-op. The process
    /// is spawned with piped stdout/stderr; both streams are relayed line by
    /// line into the structured log and never parsed. `kill_on_drop`
    /// guarantees the engine does not outlive the shell.
    pub fn spawn(&mut self) -> EngineResult<()> {
        if self.child.is_some() {
            debug!("Engine already running, spawn is a no-op");
            return Ok(());
        }

        let binary = self.resolve_binary();
        info!(binary = %binary.display(), "Spawning monitoring engine");

        let mut child = Command::new(&binary)
            .args(&self.config.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::SpawnFailed {
                binary: binary.clone(),
                reason: e.to_string(),
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(relay_diagnostics(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(relay_diagnostics(stderr, "stderr"));
        }

        info!(pid = ?child.id(), "Engine spawned");
        self.child = Some(child);
        Ok(())
    }

    /// Send the kill signal to the engine and drop the handle.
    ///
    /// No-op when no engine is live. Best-effort and fire-and-forget: the
    /// signal is sent without waiting for the process to actually exit.
    pub fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            debug!("No engine process, terminate is a no-op");
            return;
        };

        match child.start_kill() {
            Ok(()) => info!(pid = ?child.id(), "Engine termination signal sent"),
            Err(e) => {
                let err = EngineError::SignalFailed {
                    reason: e.to_string(),
                };
                warn!(error = %err, "Engine termination failed");
            }
        }
    }

    /// Resolve the engine binary path.
    ///
    /// Order: explicit config override, then alongside the shell executable
    /// (packaged install), then the development layout.
    fn resolve_binary(&self) -> PathBuf {
        if let Some(path) = &self.config.binary {
            return path.clone();
        }

        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let packaged = dir.join(ENGINE_BINARY);
                if packaged.exists() {
                    return packaged;
                }
            }
        }

        PathBuf::from("engine").join("dist").join(ENGINE_BINARY)
    }
}

impl Drop for EngineSupervisor {
    fn drop(&mut self) {
        // The kill signal itself comes from kill_on_drop on the child
        if self.child.is_some() {
            info!("Supervisor dropped with live engine, terminating");
        }
    }
}

impl std::fmt::Debug for EngineSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSupervisor")
            .field("running", &self.is_running())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

/// Relay one diagnostic stream of the engine into the log, line by line.
async fn relay_diagnostics<R: AsyncRead + Unpin>(reader: R, stream: &'static str) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                "stderr" => warn!(%line, "Engine stderr"),
                _ => info!(%line, "Engine stdout"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, stream, "Engine diagnostic stream read failed");
                break;
            }
        }
    }
    debug!(stream, "Engine diagnostic stream closed");
}
