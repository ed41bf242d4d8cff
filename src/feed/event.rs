//! Feed event payloads
//!
//! Events arrive from the engine as self-contained JSON objects. Two shapes
//! are recognized: an error report (`error` field) and a telemetry report
//! (`log` and/or `protocol_counts`). Anything else is carried through
//! untouched; deciding relevance is the presentation layer's job.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Synthetic notice injected when the feed connection opens.
pub const MONITORING_STARTED_NOTICE: &str = "[System] Monitoring started.";

/// Synthetic notice injected on each refused connection attempt.
pub const RETRYING_NOTICE: &str = "[System] Connection refused. Retrying...";

/// A single structured message from the engine's event stream.
///
/// Unrecognized keys are preserved in `extra` so the payload reaches the
/// presentation layer verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeedEvent {
    /// Human-readable log line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,

    /// Engine-reported error, forwarded for display and never acted upon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Aggregate counters keyed by category name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_counts: Option<BTreeMap<String, u64>>,

    /// Any keys this shell does not recognize
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FeedEvent {
    /// Synthetic "monitoring started" notice (not sourced from the engine)
    pub fn monitoring_started() -> Self {
        Self {
            log: Some(MONITORING_STARTED_NOTICE.to_string()),
            ..Self::default()
        }
    }

    /// Synthetic retry notice (not sourced from the engine)
    pub fn retrying() -> Self {
        Self {
            log: Some(RETRYING_NOTICE.to_string()),
            ..Self::default()
        }
    }

    /// Parse a raw text frame into an event.
    ///
    /// Frames that are not JSON objects are wrapped as a telemetry event
    /// carrying the raw text, so no inbound message is ever dropped.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<FeedEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Non-JSON feed frame, forwarding raw text");
                Self {
                    log: Some(text.to_string()),
                    ..Self::default()
                }
            }
        }
    }

    /// Whether this is an engine-reported error payload
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
