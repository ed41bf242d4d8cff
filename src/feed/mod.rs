//! Live feed from the monitoring engine
//!
//! A single persistent WebSocket connection carrying structured events,
//! with connect-after-grace-delay, constant-interval retry on refusal, and
//! cancellable teardown.

pub mod connector;
pub mod event;

pub use connector::{FeedConnector, FeedUpdate};
pub use event::FeedEvent;
