//! Axum router construction for the channel server.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for the browser front-end.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::control;
use crate::state::AppState;
use crate::ws;

/// Plain-text body served at `GET /`.
pub const STATUS_TEXT: &str = "WebSocket server is running";

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- plain-text liveness message
/// - `GET /ws` -- echo channel
/// - `GET /ws/raw` -- raw echo
/// - `GET /ws/presentation` -- playback snapshot stream
/// - `GET /api/presentation` and the `POST /api/presentation/*` controls
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status
        .route("/", get(index))
        // WebSocket
        .route("/ws", get(ws::ws_echo))
        .route("/ws/raw", get(ws::ws_raw))
        .route("/ws/presentation", get(ws::ws_presentation))
        // Presentation control
        .route("/api/presentation", get(control::get_presentation))
        .route("/api/presentation/pause", post(control::pause))
        .route("/api/presentation/resume", post(control::resume))
        .route("/api/presentation/reset", post(control::reset))
        .route("/api/presentation/advance", post(control::advance))
        .route("/api/presentation/speed", post(control::set_speed))
        .route("/api/presentation/signal", post(control::report_signal))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    STATUS_TEXT
}
