//! Resilient client for the agent-updates WebSocket feed.
//!
//! [`FeedLifecycle`] is the pure reconnect state machine; [`AgentFeed`] wraps
//! it around a real socket, one instance per `(thread_id, access_token)`
//! subscription.

mod error;
mod feed;
mod lifecycle;

pub use error::{ClientError, Result};
pub use feed::{AgentFeed, FeedConfig, FeedTarget, UpdateHandler};
pub use lifecycle::{
    CloseReason, ConnectionPhase, FeedLifecycle, MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_MS,
    RECONNECT_MAX_MS, ReconnectPolicy, RetryDecision,
};
