//! Showcase binary for the Audience Showcase.
//!
//! This is the main entry point that wires together the presentation
//! runner, the echo channel server and the control API. It loads
//! configuration, starts both subsystems, and runs until the
//! presentation ends or the process receives Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `showcase-config.yaml` (or defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Spawn the presentation runner with a narrating callback
//! 4. Start the channel server with the presentation attached, and a
//!    connectivity check against it
//! 5. Wait for the presentation to end or for Ctrl-C
//! 6. Log the result

mod connectivity;
mod error;
mod narration;

use std::path::Path;
use std::sync::Arc;

use showcase_channel::ReconnectPolicy;
use showcase_channel::server::ServerConfig;
use showcase_channel::state::AppState;
use showcase_core::config::{LoggingConfig, ShowcaseConfig};
use showcase_core::presentation::{self, Presentation};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::narration::NarrationCallback;

/// Config file looked up relative to the working directory.
const CONFIG_PATH: &str = "showcase-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the presentation
/// task fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!("showcase-engine starting");
    if from_file {
        info!(path = CONFIG_PATH, "Configuration loaded");
    } else {
        info!("Config file not found, using defaults");
    }
    info!(
        speed_factor = config.presentation.speed_factor,
        tick_interval_ms = config.presentation.tick_interval_ms,
        loop_playback = config.presentation.loop_playback,
        port = config.channel.port,
        "Presentation settings"
    );

    // 3. Spawn the presentation.
    let (handle, mut task) =
        Presentation::spawn(&config, NarrationCallback::new()).map_err(EngineError::from)?;
    info!("Presentation runner started");

    // 4. Start the channel server.
    let state = Arc::new(AppState::with_presentation(handle.clone()));
    let channel = showcase_channel::spawn_channel(&ServerConfig::from(&config.channel), state)
        .await
        .map_err(EngineError::from)?;
    info!(addr = %channel.local_addr, "Channel server started");

    let check = connectivity::spawn_check(
        channel.local_addr,
        ReconnectPolicy::from_config(&config.channel),
    );

    // 5. Run until the presentation ends or Ctrl-C.
    let finished = tokio::select! {
        joined = &mut task => Some(joined),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            None
        }
    };

    let joined = if let Some(joined) = finished {
        joined
    } else {
        info!("Shutdown signal received, stopping presentation");
        if let Err(e) = handle.stop().await {
            warn!(error = %e, "Presentation already stopped");
        }
        task.await
    };

    check.abort();
    channel.task.abort();
    let result = joined.map_err(|e| EngineError::Task {
        message: e.to_string(),
    })?;

    // 6. Log results.
    presentation::log_presentation_end(&result);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "showcase-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from [`CONFIG_PATH`], falling back to defaults
/// when the file is missing. Returns whether the file was used.
fn load_config() -> Result<(ShowcaseConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((ShowcaseConfig::from_file(config_path)?, true))
    } else {
        let mut config = ShowcaseConfig::default();
        config.channel.apply_env_overrides();
        Ok((config, false))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| EngineError::Logging {
            message: format!("invalid log level '{}': {e}", logging.level),
        })?;

    let installed = if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}
