//! Error types for the showcase binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and playback.

/// Top-level error for the showcase binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: showcase_core::config::ConfigError,
    },

    /// The presentation could not be built or has stopped.
    #[error("presentation error: {source}")]
    Presentation {
        /// The underlying presentation error.
        #[from]
        source: showcase_core::presentation::PresentationError,
    },

    /// The channel server failed to start.
    #[error("channel error: {source}")]
    Channel {
        /// The underlying startup error.
        #[from]
        source: showcase_channel::StartupError,
    },

    /// The presentation task panicked or was cancelled.
    #[error("presentation task failed: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },
}
