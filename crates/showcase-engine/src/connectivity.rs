//! Live connectivity check against the engine's own echo channel.
//!
//! Once the channel server is up, an [`EchoClient`] connects to it and
//! pings on every (re)connect. Failures are logged and never fatal.

use std::net::SocketAddr;

use serde_json::json;
use showcase_channel::{ClientEvent, EchoClient, ReconnectPolicy};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// URL of the echo channel served at `addr`, using loopback for
/// wildcard binds.
pub fn echo_url(addr: SocketAddr) -> String {
    let host = if addr.ip().is_unspecified() {
        String::from("127.0.0.1")
    } else {
        addr.ip().to_string()
    };
    format!("ws://{host}:{}/ws", addr.port())
}

/// Spawn the connectivity check. The task ends when the client gives up.
pub fn spawn_check(addr: SocketAddr, policy: ReconnectPolicy) -> JoinHandle<()> {
    let url = echo_url(addr);
    tokio::spawn(async move {
        let (client, mut events) = EchoClient::spawn(url.clone(), policy);
        loop {
            match events.recv().await {
                Ok(ClientEvent::Connected) => {
                    if let Err(e) = client.send(&json!({"type": "ping"})).await {
                        warn!(error = %e, "Connectivity ping failed");
                    }
                }
                Ok(ClientEvent::Message(message)) => {
                    if message.get("type").and_then(serde_json::Value::as_str) == Some("pong") {
                        info!(url = %url, "Echo channel reachable");
                    } else {
                        debug!(%message, "Connectivity check message");
                    }
                }
                Ok(ClientEvent::Error(error)) => debug!(%error, "Connectivity check error"),
                Ok(ClientEvent::Disconnected) => debug!("Connectivity check disconnected"),
                Ok(ClientEvent::Unavailable) => {
                    warn!(url = %url, "Echo channel unavailable, connectivity check stopped");
                    break;
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Connectivity check lagged"),
                Err(RecvError::Closed) => break,
            }
        }
        client.close();
    })
}
