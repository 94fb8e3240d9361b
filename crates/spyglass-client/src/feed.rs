//! Async owner of the agent-updates socket.
//!
//! One `AgentFeed` serves one `(thread_id, access_token)` identity at a time.
//! A background driver task owns the physical socket and loops through the
//! lifecycle decisions from [`FeedLifecycle`]; every externally visible
//! effect is guarded by an epoch counter so attempts that outlive a newer
//! `connect` or `disconnect` are discarded instead of racing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use spyglass_proto::{AgentUpdate, ClientMessage, decode_update};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ClientError, Result};
use crate::lifecycle::{
    CloseReason, ConnectionPhase, FeedLifecycle, ReconnectPolicy, RetryDecision,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Callback invoked for every decoded update.
pub type UpdateHandler = Arc<dyn Fn(AgentUpdate) + Send + Sync>;

/// Identity of one feed subscription. Both components are required, so an
/// existing target is always a connectable identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTarget {
    thread_id: String,
    access_token: String,
}

impl FeedTarget {
    /// Returns `None` when either component is empty or whitespace.
    #[must_use]
    pub fn new(thread_id: impl Into<String>, access_token: impl Into<String>) -> Option<Self> {
        let thread_id = thread_id.into();
        let access_token = access_token.into();
        if thread_id.trim().is_empty() || access_token.trim().is_empty() {
            return None;
        }
        Some(Self {
            thread_id,
            access_token,
        })
    }

    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

/// Feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// `ws://` or `wss://` base URL of the task service.
    pub base_url: String,
    pub policy: ReconnectPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8000".to_string(),
            policy: ReconnectPolicy::default(),
        }
    }
}

struct FeedShared {
    policy: ReconnectPolicy,
    base_url: Url,
    /// Bumped by every `connect` and `disconnect`. Drivers carry the epoch
    /// they were spawned with and go silent once it is stale.
    epoch: AtomicU64,
    attempts: AtomicU32,
    phase: RwLock<ConnectionPhase>,
    writer: Mutex<Option<WsWriter>>,
}

impl FeedShared {
    fn current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    async fn set_phase(&self, epoch: u64, phase: ConnectionPhase) {
        if self.current(epoch) {
            *self.phase.write().await = phase;
        }
    }
}

/// Client for one agent-updates subscription.
pub struct AgentFeed {
    shared: Arc<FeedShared>,
    driver: Mutex<Option<JoinHandle<()>>>,
    target: Mutex<Option<FeedTarget>>,
}

impl AgentFeed {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.scheme() != "ws" && base_url.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "base URL must use ws:// or wss:// scheme, got: {}",
                base_url.scheme()
            )));
        }
        Ok(Self {
            shared: Arc::new(FeedShared {
                policy: config.policy,
                base_url,
                epoch: AtomicU64::new(0),
                attempts: AtomicU32::new(0),
                phase: RwLock::new(ConnectionPhase::Disconnected),
                writer: Mutex::new(None),
            }),
            driver: Mutex::new(None),
            target: Mutex::new(None),
        })
    }

    /// Current connection phase.
    pub async fn phase(&self) -> ConnectionPhase {
        *self.shared.phase.read().await
    }

    /// Abnormal closes since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Start (or restart) the feed for `target`, forwarding every decoded
    /// update to `handler`.
    ///
    /// Idempotent while already connecting or connected to the same
    /// identity. A different identity tears the old cycle down and starts a
    /// fresh one with the attempt counter reset. Returns immediately; effects
    /// are observable through [`phase`](Self::phase) and the handler.
    pub async fn connect(&self, target: FeedTarget, handler: UpdateHandler) {
        let mut current_target = self.target.lock().await;
        let phase = self.phase().await;
        if current_target.as_ref() == Some(&target)
            && matches!(
                phase,
                ConnectionPhase::Connecting | ConnectionPhase::Connected
            )
        {
            debug!(
                thread_id = target.thread_id(),
                "connect suppressed, feed already in flight"
            );
            return;
        }

        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.driver.lock().await.take() {
            task.abort();
        }
        *self.shared.writer.lock().await = None;
        self.shared.attempts.store(0, Ordering::SeqCst);
        *self.shared.phase.write().await = ConnectionPhase::Connecting;
        *current_target = Some(target.clone());

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(run_driver(shared, epoch, target, handler));
        *self.driver.lock().await = Some(task);
    }

    /// Like [`connect`](Self::connect), but delivers updates on an unbounded
    /// channel instead of a callback.
    pub async fn connect_channel(
        &self,
        target: FeedTarget,
    ) -> mpsc::UnboundedReceiver<AgentUpdate> {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let handler: UpdateHandler = Arc::new(move |update| {
            let _ = update_tx.send(update);
        });
        self.connect(target, handler).await;
        update_rx
    }

    /// Stop the feed: close the socket with a normal close code, cancel any
    /// pending retry, and reset the attempt counter. Safe to call with no
    /// active connection.
    pub async fn disconnect(&self) {
        // Same lock order as connect: target, then driver, then writer.
        let mut current_target = self.target.lock().await;
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.driver.lock().await.take() {
            task.abort();
        }
        if let Some(mut writer) = self.shared.writer.lock().await.take() {
            let close = Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }));
            if let Err(error) = writer.send(close).await {
                debug!(%error, "close frame not delivered");
            }
        }
        self.shared.attempts.store(0, Ordering::SeqCst);
        *current_target = None;
        *self.shared.phase.write().await = ConnectionPhase::Disconnected;
    }

    /// Send an extra keepalive ping over the live socket.
    pub async fn send_ping(&self) -> Result<()> {
        let text = ClientMessage::Ping.encode()?;
        let mut writer_guard = self.shared.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(ClientError::NotConnected)?;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|error| ClientError::WebSocket(error.to_string()))
    }
}

fn feed_url(base: &Url, target: &FeedTarget) -> Result<Url> {
    let base = base.as_str().trim_end_matches('/');
    let mut url = Url::parse(&format!(
        "{base}/apps/threads/ws/{}/agent_updates",
        target.thread_id()
    ))?;
    url.query_pairs_mut()
        .append_pair("access_token", target.access_token());
    Ok(url)
}

async fn run_driver(
    shared: Arc<FeedShared>,
    epoch: u64,
    target: FeedTarget,
    handler: UpdateHandler,
) {
    let url = match feed_url(&shared.base_url, &target) {
        Ok(url) => url,
        Err(error) => {
            warn!(%error, thread_id = target.thread_id(), "feed URL rejected");
            shared.set_phase(epoch, ConnectionPhase::Error).await;
            return;
        }
    };

    let mut lifecycle = FeedLifecycle::new(shared.policy);
    loop {
        if !shared.current(epoch) {
            return;
        }
        lifecycle.mark_connecting();
        shared.set_phase(epoch, ConnectionPhase::Connecting).await;

        let reason = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                if !shared.current(epoch) {
                    return;
                }
                lifecycle.mark_open();
                shared.attempts.store(0, Ordering::SeqCst);
                shared.set_phase(epoch, ConnectionPhase::Connected).await;
                info!(thread_id = target.thread_id(), "agent feed connected");

                let (mut writer, mut reader) = stream.split();
                send_keepalive_ping(&mut writer).await;
                *shared.writer.lock().await = Some(writer);

                let reason = read_frames(&shared, epoch, &mut reader, &handler).await;
                *shared.writer.lock().await = None;
                reason
            }
            Err(error) => {
                warn!(%error, thread_id = target.thread_id(), "agent feed connect failed");
                CloseReason::TransportError
            }
        };

        if !shared.current(epoch) {
            return;
        }
        match lifecycle.mark_closed(reason) {
            RetryDecision::Stop => {
                info!(thread_id = target.thread_id(), "agent feed closed normally");
                shared.set_phase(epoch, ConnectionPhase::Disconnected).await;
                return;
            }
            RetryDecision::GiveUp => {
                warn!(
                    thread_id = target.thread_id(),
                    "agent feed gave up after {} attempts",
                    shared.policy.max_attempts
                );
                shared.set_phase(epoch, ConnectionPhase::Error).await;
                return;
            }
            RetryDecision::Retry { delay } => {
                shared.attempts.store(lifecycle.attempts(), Ordering::SeqCst);
                debug!(
                    thread_id = target.thread_id(),
                    attempt = lifecycle.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "agent feed retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Application-level keepalive, sent once immediately after open so idle
/// proxies see traffic right away. Delivery failure is left to the read loop
/// to notice.
async fn send_keepalive_ping(writer: &mut WsWriter) {
    match ClientMessage::Ping.encode() {
        Ok(text) => {
            if let Err(error) = writer.send(Message::Text(text.into())).await {
                warn!(%error, "keepalive ping not delivered");
            }
        }
        Err(error) => warn!(%error, "keepalive ping failed to encode"),
    }
}

async fn read_frames(
    shared: &FeedShared,
    epoch: u64,
    reader: &mut WsReader,
    handler: &UpdateHandler,
) -> CloseReason {
    while let Some(frame) = reader.next().await {
        if !shared.current(epoch) {
            return CloseReason::Normal;
        }
        match frame {
            Ok(Message::Text(text)) => match decode_update(text.as_str()) {
                Ok(update) => {
                    match &update {
                        AgentUpdate::Pong {} => debug!("keepalive pong"),
                        AgentUpdate::Unknown { kind } => {
                            debug!(kind = kind.as_str(), "ignoring unknown update type");
                        }
                        _ => {}
                    }
                    handler(update);
                }
                Err(error) => warn!(%error, "dropping undecodable frame"),
            },
            Ok(Message::Ping(payload)) => {
                debug!(bytes = payload.len(), "transport ping");
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Binary(_)) => {}
            Ok(Message::Close(frame)) => {
                return match frame {
                    Some(frame) if u16::from(frame.code) == 1000 => CloseReason::Normal,
                    Some(frame) => CloseReason::Abnormal(u16::from(frame.code)),
                    // No status code on the wire.
                    None => CloseReason::Abnormal(1005),
                };
            }
            Ok(Message::Frame(_)) => {}
            Err(error) => {
                warn!(%error, "agent feed read error");
                return CloseReason::TransportError;
            }
        }
    }
    // EOF without a close handshake.
    CloseReason::TransportError
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_refuses_empty_components() {
        assert!(FeedTarget::new("", "token").is_none());
        assert!(FeedTarget::new("thread", "").is_none());
        assert!(FeedTarget::new("  ", "token").is_none());
        assert!(FeedTarget::new("thread", "token").is_some());
    }

    #[test]
    fn feed_url_embeds_thread_and_encodes_token() {
        let base = Url::parse("ws://feed.example.com").expect("base url");
        let target = FeedTarget::new("t-42", "se cret+x").expect("target");
        let url = feed_url(&base, &target).expect("feed url");
        assert_eq!(
            url.as_str(),
            "ws://feed.example.com/apps/threads/ws/t-42/agent_updates?access_token=se+cret%2Bx"
        );
    }

    #[test]
    fn feed_url_tolerates_trailing_slash_on_base() {
        let base = Url::parse("wss://feed.example.com/").expect("base url");
        let target = FeedTarget::new("t", "k").expect("target");
        let url = feed_url(&base, &target).expect("feed url");
        assert_eq!(
            url.as_str(),
            "wss://feed.example.com/apps/threads/ws/t/agent_updates?access_token=k"
        );
    }

    #[test]
    fn new_rejects_non_websocket_schemes() {
        let result = AgentFeed::new(FeedConfig {
            base_url: "https://feed.example.com".to_string(),
            policy: ReconnectPolicy::default(),
        });
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));

        let result = AgentFeed::new(FeedConfig {
            base_url: "not a url".to_string(),
            policy: ReconnectPolicy::default(),
        });
        assert!(matches!(result, Err(ClientError::UrlParse(_))));
    }
}
