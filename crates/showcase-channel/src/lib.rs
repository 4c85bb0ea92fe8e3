//! Echo channel and presentation control server for the Audience Showcase.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Echo channel** (`/ws`): pings get a pong, broadcast frames are
//!   relayed to every other connection, other JSON is echoed back with a
//!   timestamp, and malformed frames get a typed error
//! - **Raw echo** (`/ws/raw`) that returns frames unchanged
//! - **Playback stream** (`/ws/presentation`) pushing a snapshot of the
//!   running presentation whenever it changes
//! - **Control REST endpoints** (`/api/presentation/*`) for pause, resume,
//!   reset, advance, speed and completion signals
//! - **Status text** at `GET /`
//!
//! It also provides [`EchoClient`], a reconnecting client for the echo
//! channel with bounded linear backoff.
//!
//! # Architecture
//!
//! Echo connections share a [`tokio::sync::broadcast`] relay held in
//! [`AppState`]. The presentation runs on its own task and is reached
//! through a cloneable handle, so handlers never block the tick loop.

pub mod client;
pub mod control;
pub mod error;
pub mod protocol;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use client::{ClientEvent, EchoClient, ReconnectPolicy};
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve_listener, start_server};
pub use startup::{RunningChannel, StartupError, spawn_channel};
pub use state::AppState;
