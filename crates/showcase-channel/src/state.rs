//! Shared application state for the channel server.
//!
//! [`AppState`] holds the relay channel that carries broadcast frames
//! between echo connections, and an optional handle to the running
//! presentation for the control endpoints and the playback stream.

use showcase_core::presentation::PresentationHandle;
use showcase_types::ConnectionId;
use tokio::sync::broadcast;

use crate::error::ChannelError;

/// Capacity of the relay broadcast channel.
///
/// If a connection falls behind by more than this many frames it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip ahead.
const BROADCAST_CAPACITY: usize = 256;

/// A broadcast frame on its way to every other echo connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    /// Connection that sent the frame; it does not receive it back.
    pub from: ConnectionId,
    /// The original text frame, unmodified.
    pub text: String,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    relay_tx: broadcast::Sender<RelayFrame>,
    /// Control handle for the running presentation, if one is attached.
    pub presentation: Option<PresentationHandle>,
}

impl AppState {
    /// State with no presentation attached (echo only).
    pub fn new() -> Self {
        let (relay_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            relay_tx,
            presentation: None,
        }
    }

    /// State with a presentation attached.
    pub fn with_presentation(handle: PresentationHandle) -> Self {
        Self {
            presentation: Some(handle),
            ..Self::new()
        }
    }

    /// Subscribe to relayed broadcast frames.
    pub fn subscribe_relay(&self) -> broadcast::Receiver<RelayFrame> {
        self.relay_tx.subscribe()
    }

    /// Relay a frame to every connection. Returns the number of
    /// subscribers reached, including the sender's own subscription.
    pub fn relay(&self, from: ConnectionId, text: String) -> usize {
        // send errs only when nobody is subscribed.
        self.relay_tx.send(RelayFrame { from, text }).unwrap_or(0)
    }

    /// The attached presentation handle.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unavailable`] when the server runs without
    /// a presentation.
    pub fn presentation(&self) -> Result<&PresentationHandle, ChannelError> {
        self.presentation
            .as_ref()
            .ok_or_else(|| ChannelError::Unavailable("no presentation attached".to_owned()))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
