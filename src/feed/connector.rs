//! Feed Connector
//!
//! Owns the single persistent connection to the engine's event stream. One
//! spawned task carries the whole connection lifecycle: grace delay, the
//! connect attempt, the relay loop, and every retry timer. Aborting that
//! task is the cancellation point that makes `disconnect()` deterministic:
//! no timer scheduled before the abort can fire after it.

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::feed::event::FeedEvent;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Updates emitted by the connector, in order, over a single channel.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// The connection opened; carries the synthetic started notice
    Opened { notice: FeedEvent },
    /// An attempt was refused; carries the synthetic retry notice
    Retrying { notice: FeedEvent },
    /// An inbound message from the engine
    Event(FeedEvent),
    /// The relay ended without rearming a retry (clean close or
    /// non-refusal error); the connector is idle until reconnected
    Closed,
}

/// How a relay loop ended.
enum RelayEnd {
    /// Refusal-classified failure; the retry timer rearms
    Retryable,
    /// Anything else; the connector goes idle
    Terminal,
}

/// Maintains the live feed connection to the engine.
pub struct FeedConnector {
    config: FeedConfig,
    task: Option<JoinHandle<()>>,
}

impl FeedConnector {
    /// Create a connector; nothing runs until [`connect`](Self::connect).
    pub fn new(config: FeedConfig) -> Self {
        Self { config, task: None }
    }

    /// Whether a connect attempt is pending or a connection is live.
    pub fn is_engaged(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Schedule a connection attempt after the grace delay.
    ///
    /// No-op while an attempt is pending or a connection is live. All
    /// updates (synthetic notices included) flow through `updates` in the
    /// exact order they occur.
    pub fn connect(&mut self, updates: mpsc::UnboundedSender<FeedUpdate>) {
        if self.is_engaged() {
            debug!("Feed connection already pending or live, connect is a no-op");
            return;
        }

        let config = self.config.clone();
        info!(url = %config.url, "Scheduling feed connection");
        self.task = Some(tokio::spawn(connection_task(config, updates)));
    }

    /// Tear down the connection and cancel any pending attempt.
    ///
    /// No-op when nothing is pending or live. Aborting the owning task
    /// cancels the grace/retry sleeps and drops the socket, closing it.
    pub fn disconnect(&mut self) {
        match self.task.take() {
            Some(task) => {
                task.abort();
                info!("Feed disconnected");
            }
            None => debug!("No feed connection, disconnect is a no-op"),
        }
    }
}

impl Drop for FeedConnector {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for FeedConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConnector")
            .field("url", &self.config.url)
            .field("engaged", &self.is_engaged())
            .finish_non_exhaustive()
    }
}

/// The connection lifecycle: grace delay, then connect/relay/retry until
/// success turns terminal, a terminal failure occurs, or the task is aborted.
async fn connection_task(config: FeedConfig, updates: mpsc::UnboundedSender<FeedUpdate>) {
    // Let a freshly spawned engine bring up its listener first
    tokio::time::sleep(config.grace_delay()).await;

    loop {
        match connect_async(config.url.as_str()).await {
            Ok((ws, _)) => {
                info!(url = %config.url, "Feed connection established");
                let opened = FeedUpdate::Opened {
                    notice: FeedEvent::monitoring_started(),
                };
                if updates.send(opened).is_err() {
                    return;
                }

                match relay_frames(ws, &updates).await {
                    RelayEnd::Retryable => {}
                    RelayEnd::Terminal => {
                        let _ = updates.send(FeedUpdate::Closed);
                        return;
                    }
                }
            }
            Err(e) if is_connection_refused(&e) => {
                debug!(url = %config.url, "Feed connection refused");
            }
            Err(e) => {
                let err = FeedError::HandshakeFailed {
                    url: config.url.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %err, "Feed connection failed, not retrying");
                let _ = updates.send(FeedUpdate::Closed);
                return;
            }
        }

        // Refusal path: notice, fixed interval, try again. Unbounded until
        // success or disconnect.
        let retrying = FeedUpdate::Retrying {
            notice: FeedEvent::retrying(),
        };
        if updates.send(retrying).is_err() {
            return;
        }
        tokio::time::sleep(config.retry_interval()).await;
    }
}

/// Relay inbound frames in arrival order until the stream ends.
async fn relay_frames(ws: WsStream, updates: &mpsc::UnboundedSender<FeedUpdate>) -> RelayEnd {
    let (_sink, mut stream) = ws.split();

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let event = FeedEvent::parse(text.as_str());
                if updates.send(FeedUpdate::Event(event)).is_err() {
                    return RelayEnd::Terminal;
                }
            }
            Ok(Message::Binary(data)) => {
                let event = FeedEvent::parse(&String::from_utf8_lossy(&data));
                if updates.send(FeedUpdate::Event(event)).is_err() {
                    return RelayEnd::Terminal;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Feed closed by engine");
                return RelayEnd::Terminal;
            }
            // Ping/pong handled by the transport
            Ok(_) => {}
            Err(e) if is_connection_refused(&e) => {
                debug!(error = %e, "Feed dropped with refusal, rearming retry");
                return RelayEnd::Retryable;
            }
            Err(e) => {
                let err = FeedError::ConnectionClosed {
                    reason: e.to_string(),
                };
                warn!(error = %err, "Feed connection error");
                return RelayEnd::Terminal;
            }
        }
    }

    info!("Feed stream ended");
    RelayEnd::Terminal
}

/// Structured refusal classification: an I/O-level connection refusal, as
/// opposed to resets, DNS failures, or handshake errors. Only this failure
/// rearms the retry timer.
fn is_connection_refused(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    /// Config with short timings so tests run quickly
    fn fast_config(port: u16) -> FeedConfig {
        FeedConfig {
            url: format!("ws://127.0.0.1:{port}/ws"),
            grace_delay_ms: 10,
            retry_interval_ms: 50,
        }
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<FeedUpdate>,
        what: &str,
    ) -> FeedUpdate {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .unwrap_or_else(|| panic!("update channel closed waiting for {what}"))
    }

    /// Serve one WebSocket connection: send the given frames, then close.
    async fn serve_frames(listener: TcpListener, frames: Vec<String>) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for frame in frames {
            ws.send(Message::text(frame)).await.unwrap();
        }
        ws.close(None).await.ok();
    }

    #[tokio::test]
    async fn test_opened_then_events_in_order_then_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_frames(
            listener,
            vec![
                r#"{"log": "A"}"#.to_string(),
                r#"{"log": "B"}"#.to_string(),
                r#"{"log": "C"}"#.to_string(),
            ],
        ));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connector = FeedConnector::new(fast_config(port));
        connector.connect(tx);

        assert!(matches!(
            recv(&mut rx, "opened").await,
            FeedUpdate::Opened { .. }
        ));
        for expected in ["A", "B", "C"] {
            match recv(&mut rx, expected).await {
                FeedUpdate::Event(event) => assert_eq!(event.log.as_deref(), Some(expected)),
                other => panic!("expected event {expected}, got {other:?}"),
            }
        }
        assert_eq!(recv(&mut rx, "closed").await, FeedUpdate::Closed);
    }

    #[tokio::test]
    async fn test_refused_retries_until_listener_appears() {
        // Reserve a port, then free it so attempts are refused
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connector = FeedConnector::new(fast_config(port));
        connector.connect(tx);

        // Three refusals, three retry notices, none overlapping
        for i in 0..3 {
            match recv(&mut rx, "retry notice").await {
                FeedUpdate::Retrying { notice } => {
                    assert_eq!(
                        notice.log.as_deref(),
                        Some("[System] Connection refused. Retrying..."),
                        "retry notice {i}"
                    );
                }
                other => panic!("expected retry notice, got {other:?}"),
            }
        }

        // Bring the engine's listener up; the fourth attempt succeeds
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        tokio::spawn(serve_frames(listener, vec![r#"{"log": "up"}"#.to_string()]));

        // Drain any further retry notices racing the bind, then expect Opened
        loop {
            match recv(&mut rx, "opened after retries").await {
                FeedUpdate::Retrying { .. } => continue,
                FeedUpdate::Opened { notice } => {
                    assert_eq!(
                        notice.log.as_deref(),
                        Some("[System] Monitoring started.")
                    );
                    break;
                }
                other => panic!("expected opened, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_disconnect_during_grace_delay_cancels_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = FeedConfig {
            url: format!("ws://127.0.0.1:{port}/ws"),
            grace_delay_ms: 5_000,
            retry_interval_ms: 50,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connector = FeedConnector::new(config);
        connector.connect(tx);
        assert!(connector.is_engaged());

        connector.disconnect();

        // No attempt may fire after disconnect: the channel stays silent
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert!(!connector.is_engaged());
    }

    #[tokio::test]
    async fn test_disconnect_during_retry_cancels_future_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connector = FeedConnector::new(fast_config(port));
        connector.connect(tx);

        // Wait for the retry cycle to engage, then cut it off
        assert!(matches!(
            recv(&mut rx, "first retry").await,
            FeedUpdate::Retrying { .. }
        ));
        connector.disconnect();

        // Drain anything already in flight, then require silence
        tokio::time::sleep(Duration::from_millis(200)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_is_noop_while_engaged() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = FeedConfig {
            url: format!("ws://127.0.0.1:{port}/ws"),
            grace_delay_ms: 10,
            retry_interval_ms: 2_000,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connector = FeedConnector::new(config);
        connector.connect(tx.clone());
        connector.connect(tx);

        // A second live task would double the retry notices; require the
        // constant-interval cadence of a single task instead
        assert!(matches!(
            recv(&mut rx, "retry").await,
            FeedUpdate::Retrying { .. }
        ));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(
            rx.try_recv().is_err(),
            "second connect spawned a duplicate attempt"
        );

        connector.disconnect();
    }

    #[tokio::test]
    async fn test_non_websocket_peer_is_terminal_not_retried() {
        // A listener that accepts TCP but never completes the handshake
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connector = FeedConnector::new(fast_config(port));
        connector.connect(tx);

        assert_eq!(recv(&mut rx, "closed").await, FeedUpdate::Closed);
        // Terminal: no retry notice follows
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_refusal_classification_is_structured() {
        let refused = tungstenite::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(is_connection_refused(&refused));

        let reset = tungstenite::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(!is_connection_refused(&reset));

        let protocol = tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
        );
        assert!(!is_connection_refused(&protocol));
    }
}
