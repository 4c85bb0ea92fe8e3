//! Presentation control REST handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/presentation` | Current playback snapshot |
//! | `POST` | `/api/presentation/pause` | Pause playback |
//! | `POST` | `/api/presentation/resume` | Resume playback |
//! | `POST` | `/api/presentation/reset` | Restart from the first stage |
//! | `POST` | `/api/presentation/advance` | Skip to the next stage |
//! | `POST` | `/api/presentation/speed` | Set the speed factor |
//! | `POST` | `/api/presentation/signal` | Report a completion signal |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use showcase_types::SignalId;

use crate::error::ChannelError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/presentation/speed`.
#[derive(Debug, serde::Deserialize)]
pub struct SetSpeedRequest {
    /// New speed multiplier (0.1 to 10.0).
    pub speed_factor: f64,
}

/// Request body for `POST /api/presentation/signal`.
#[derive(Debug, serde::Deserialize)]
pub struct ReportSignalRequest {
    /// Wire name of the signal, e.g. `"sphereComplete"`.
    pub signal: String,
}

/// Generic success response.
#[derive(Debug, serde::Serialize)]
struct ControlResponse {
    /// Whether the command was accepted.
    ok: bool,
    /// Human-readable message.
    message: String,
}

fn accepted(message: impl Into<String>) -> Json<ControlResponse> {
    Json(ControlResponse {
        ok: true,
        message: message.into(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/presentation
// ---------------------------------------------------------------------------

/// Return the latest playback snapshot.
pub async fn get_presentation(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ChannelError> {
    let handle = state.presentation()?;
    Ok(Json(handle.snapshot()))
}

// ---------------------------------------------------------------------------
// POST /api/presentation/{pause,resume,reset,advance}
// ---------------------------------------------------------------------------

/// Pause playback. Progress is kept.
pub async fn pause(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ChannelError> {
    state.presentation()?.pause().await?;
    Ok(accepted("Presentation paused"))
}

/// Resume playback after a pause.
pub async fn resume(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ChannelError> {
    state.presentation()?.resume().await?;
    Ok(accepted("Presentation resumed"))
}

/// Clear every signal and restart from the first stage.
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ChannelError> {
    state.presentation()?.reset().await?;
    Ok(accepted("Presentation reset"))
}

/// Skip to the next stage. Ignored at the last stage.
pub async fn advance(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ChannelError> {
    state.presentation()?.advance().await?;
    Ok(accepted("Advance requested"))
}

// ---------------------------------------------------------------------------
// POST /api/presentation/speed
// ---------------------------------------------------------------------------

/// Change the speed factor. Out-of-range factors are rejected with 400.
pub async fn set_speed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetSpeedRequest>,
) -> Result<impl IntoResponse, ChannelError> {
    state.presentation()?.set_speed(body.speed_factor).await?;
    Ok(accepted(format!(
        "Speed factor set to {}",
        body.speed_factor
    )))
}

// ---------------------------------------------------------------------------
// POST /api/presentation/signal
// ---------------------------------------------------------------------------

/// Report a completion signal by wire name. Unknown names are rejected
/// with 400.
pub async fn report_signal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReportSignalRequest>,
) -> Result<impl IntoResponse, ChannelError> {
    let signal: SignalId = body
        .signal
        .parse()
        .map_err(|e: showcase_types::UnknownSignal| ChannelError::BadRequest(e.to_string()))?;
    state.presentation()?.report_signal(signal).await?;
    Ok(accepted(format!("Signal '{signal}' reported")))
}
