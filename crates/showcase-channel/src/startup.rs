//! Channel server startup helper for embedding in the engine binary.
//!
//! [`spawn_channel`] binds the listener up front, so a port clash is
//! reported to the caller, then serves on a background Tokio task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the channel server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A channel server running on a background task.
#[derive(Debug)]
pub struct RunningChannel {
    /// Address the server is listening on.
    pub local_addr: SocketAddr,
    /// The serving task. Abort it to stop the server.
    pub task: JoinHandle<()>,
}

/// Bind `config` and serve the channel on a background task.
///
/// The server runs until the task is aborted or the runtime shuts down.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound.
pub async fn spawn_channel(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<RunningChannel, StartupError> {
    let listener = server::bind(config).await?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let task = tokio::spawn(async move {
        if let Err(e) = server::serve_listener(listener, state).await {
            tracing::error!(error = %e, "Channel server exited with error");
        }
    });

    tracing::info!(%local_addr, "Channel server spawned on background task");

    Ok(RunningChannel { local_addr, task })
}
