//! Reconnecting `WebSocket` client for the echo channel.
//!
//! [`EchoClient::spawn`] runs the connection on a background task and
//! reports what happens as [`ClientEvent`]s on a broadcast channel. When
//! the connection drops the task waits `step * attempt` (capped at
//! `max_delay`) and tries again. After `max_attempts` consecutive
//! failures it emits [`ClientEvent::Unavailable`] and gives up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use showcase_core::config::ChannelConfig;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Capacity of the outgoing message queue.
const OUTGOING_CAPACITY: usize = 64;

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Backoff settings for reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
    /// Delay added per attempt.
    pub step: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            step: Duration::from_secs(3),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Policy from the `channel` config section.
    pub const fn from_config(config: &ChannelConfig) -> Self {
        Self {
            max_attempts: config.reconnect_max_attempts,
            step: Duration::from_millis(config.reconnect_step_ms),
            max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }
}

/// Something that happened on the client connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connection opened.
    Connected,
    /// A JSON message arrived from the server.
    Message(Value),
    /// A frame could not be parsed, or the socket reported an error.
    Error(String),
    /// The connection closed. A reconnect may follow.
    Disconnected,
    /// Every reconnect attempt failed. The client has given up.
    Unavailable,
}

/// Errors returned by [`EchoClient`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No connection is open right now.
    #[error("not connected")]
    NotConnected,

    /// The client task has ended.
    #[error("client closed")]
    Closed,

    /// The message could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Handle to a background echo-channel connection.
#[derive(Debug)]
pub struct EchoClient {
    outgoing: mpsc::Sender<String>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl EchoClient {
    /// Start connecting to `url` on a background task.
    ///
    /// Returns the client and a receiver that sees every event from the
    /// first connect attempt onwards.
    pub fn spawn(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, broadcast::Receiver<ClientEvent>) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);
        let (events_tx, events_rx) = broadcast::channel(EVENT_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run(
            url.into(),
            policy,
            outgoing_rx,
            events_tx,
            Arc::clone(&connected),
        ));

        let client = Self {
            outgoing: outgoing_tx,
            connected,
            task,
        };
        (client, events_rx)
    }

    /// Serialize `message` and send it as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while no connection is open
    /// and [`ClientError::Closed`] once the client task has ended.
    pub async fn send(&self, message: &Value) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let text = serde_json::to_string(message)?;
        self.outgoing
            .send(text)
            .await
            .map_err(|_closed| ClientError::Closed)
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Whether the background task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the client and drop its connection.
    pub fn close(self) {
        self.connected.store(false, Ordering::Release);
        self.task.abort();
    }
}

/// Why a session ended.
enum SessionEnd {
    /// The server closed the socket or it failed.
    Dropped,
    /// The client handle is gone.
    HandleDropped,
}

async fn run(
    url: String,
    policy: ReconnectPolicy,
    mut outgoing: mpsc::Receiver<String>,
    events: broadcast::Sender<ClientEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut attempt: u32 = 0;

    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                attempt = 0;
                connected.store(true, Ordering::Release);
                info!(url = %url, "Echo client connected");
                let _ = events.send(ClientEvent::Connected);

                let end = session(stream, &mut outgoing, &events).await;
                connected.store(false, Ordering::Release);
                let _ = events.send(ClientEvent::Disconnected);
                if matches!(end, SessionEnd::HandleDropped) {
                    debug!("Echo client handle dropped");
                    return;
                }
            }
            Err(e) => {
                warn!(url = %url, attempt, error = %e, "Echo client connect failed");
                let _ = events.send(ClientEvent::Error(e.to_string()));
            }
        }

        attempt = attempt.saturating_add(1);
        if attempt > policy.max_attempts {
            warn!(
                url = %url,
                attempts = policy.max_attempts,
                "Echo channel unavailable, giving up"
            );
            let _ = events.send(ClientEvent::Unavailable);
            return;
        }

        let delay = policy.delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis(), "Reconnecting echo client");
        tokio::time::sleep(delay).await;
    }
}

async fn session<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    outgoing: &mut mpsc::Receiver<String>,
    events: &broadcast::Sender<ClientEvent>,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event = serde_json::from_str::<Value>(text.as_str()).map_or_else(
                        |e| ClientEvent::Error(format!("unparseable message: {e}")),
                        ClientEvent::Message,
                    );
                    let _ = events.send(event);
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(ClientEvent::Error(e.to_string()));
                    return SessionEnd::Dropped;
                }
            },
            text = outgoing.recv() => match text {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        let _ = events.send(ClientEvent::Error(e.to_string()));
                        return SessionEnd::Dropped;
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::HandleDropped;
                }
            },
        }
    }
}
