//! Configuration loading and typed config structures for the showcase.
//!
//! The canonical configuration lives in `showcase-config.yaml` in the
//! working directory. Every field has a default, so an empty or missing
//! file yields the stock five-stage demo.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use showcase_types::Stage;
use tracing::warn;

/// Lowest accepted speed factor.
pub const MIN_SPEED_FACTOR: f64 = 0.1;

/// Highest accepted speed factor.
pub const MAX_SPEED_FACTOR: f64 = 10.0;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level showcase configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShowcaseConfig {
    /// Playback timing and looping.
    #[serde(default)]
    pub presentation: PresentationConfig,

    /// Static numeric and text fixtures shown by the panels.
    #[serde(default)]
    pub fixtures: FixtureConfig,

    /// Local animation lengths of each panel.
    #[serde(default)]
    pub panels: PanelConfig,

    /// Optional replacement for the five default stages.
    #[serde(default)]
    pub stages: Option<Vec<Stage>>,

    /// Echo channel server and client settings.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ShowcaseConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// The `PORT` environment variable overrides `channel.port`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.channel.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.presentation;
        if !(MIN_SPEED_FACTOR..=MAX_SPEED_FACTOR).contains(&p.speed_factor) {
            return Err(invalid(format!(
                "presentation.speed_factor must be within {MIN_SPEED_FACTOR}..={MAX_SPEED_FACTOR}, got {}",
                p.speed_factor
            )));
        }
        if p.tick_interval_ms == 0 {
            return Err(invalid("presentation.tick_interval_ms must be at least 1"));
        }
        if p.min_tick_interval_ms == 0 || p.min_tick_interval_ms > p.tick_interval_ms {
            return Err(invalid(
                "presentation.min_tick_interval_ms must be within 1..=tick_interval_ms",
            ));
        }
        if !(p.progress_per_second.is_finite() && p.progress_per_second > 0.0) {
            return Err(invalid("presentation.progress_per_second must be positive"));
        }

        let f = &self.fixtures;
        for (name, ratio) in [("match_ratio", f.match_ratio), ("merge_ratio", f.merge_ratio)] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(invalid(format!("fixtures.{name} must be within 0..=1")));
            }
        }
        for (name, count) in [
            ("audience_particle_count", f.audience_particle_count),
            ("document_particle_count", f.document_particle_count),
            ("client_particle_count", f.client_particle_count),
        ] {
            if count > f.max_particles_per_layer {
                return Err(invalid(format!(
                    "fixtures.{name} ({count}) exceeds max_particles_per_layer ({})",
                    f.max_particles_per_layer
                )));
            }
        }
        if f.colors.is_empty() {
            return Err(invalid("fixtures.colors must not be empty"));
        }

        let panels = &self.panels;
        if [
            panels.database_ticks,
            panels.knowledge_ticks,
            panels.fusion_ticks,
            panels.matching_ticks,
            panels.report_ticks,
        ]
        .contains(&0)
        {
            return Err(invalid("panel tick counts must be at least 1"));
        }
        if panels.report_sections == 0 {
            return Err(invalid("panels.report_sections must be at least 1"));
        }

        if self.channel.reconnect_step_ms == 0 {
            return Err(invalid("channel.reconnect_step_ms must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

/// Playback timing configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresentationConfig {
    /// Initial speed multiplier.
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,

    /// Tick period in milliseconds at speed 1.0.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Floor for the speed-scaled tick period.
    #[serde(default = "default_min_tick_interval_ms")]
    pub min_tick_interval_ms: u64,

    /// Timeline percent gained per second at speed 1.0.
    #[serde(default = "default_progress_per_second")]
    pub progress_per_second: f64,

    /// How long a gate may hold before it is forced open (0 = never).
    #[serde(default = "default_gate_timeout_ms")]
    pub gate_timeout_ms: u64,

    /// Delay between completion and the automatic restart.
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,

    /// Whether the presentation restarts after completing.
    #[serde(default = "default_true")]
    pub loop_playback: bool,

    /// Seed for particle layouts.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl PresentationConfig {
    /// Wall-clock gate timeout, or `None` when disabled.
    pub const fn gate_timeout(&self) -> Option<Duration> {
        if self.gate_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.gate_timeout_ms))
        }
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            speed_factor: default_speed_factor(),
            tick_interval_ms: default_tick_interval_ms(),
            min_tick_interval_ms: default_min_tick_interval_ms(),
            progress_per_second: default_progress_per_second(),
            gate_timeout_ms: default_gate_timeout_ms(),
            reset_delay_ms: default_reset_delay_ms(),
            loop_playback: true,
            seed: default_seed(),
        }
    }
}

/// Static fixtures: counts, ratios and caption tables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixtureConfig {
    /// Target of the database counter.
    #[serde(default = "default_max_audience_count")]
    pub max_audience_count: u64,

    /// Particles in the consumer sphere.
    #[serde(default = "default_audience_particle_count")]
    pub audience_particle_count: usize,

    /// Particles in the document cube.
    #[serde(default = "default_document_particle_count")]
    pub document_particle_count: usize,

    /// Particles in the client data panel.
    #[serde(default = "default_client_particle_count")]
    pub client_particle_count: usize,

    /// Upper bound on any layer's particle count.
    #[serde(default = "default_max_particles_per_layer")]
    pub max_particles_per_layer: usize,

    /// Fraction of the audience flagged as matched.
    #[serde(default = "default_match_ratio")]
    pub match_ratio: f64,

    /// Fraction of client data particles that merge.
    #[serde(default = "default_merge_ratio")]
    pub merge_ratio: f64,

    /// Captions for sphere particles.
    #[serde(default = "default_audience_traits")]
    pub audience_traits: Vec<String>,

    /// Captions for cube particles.
    #[serde(default = "default_document_types")]
    pub document_types: Vec<String>,

    /// Captions for client data particles.
    #[serde(default = "default_client_data_types")]
    pub client_data_types: Vec<String>,

    /// Particle palette.
    #[serde(default = "default_colors")]
    pub colors: Vec<String>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            max_audience_count: default_max_audience_count(),
            audience_particle_count: default_audience_particle_count(),
            document_particle_count: default_document_particle_count(),
            client_particle_count: default_client_particle_count(),
            max_particles_per_layer: default_max_particles_per_layer(),
            match_ratio: default_match_ratio(),
            merge_ratio: default_merge_ratio(),
            audience_traits: default_audience_traits(),
            document_types: default_document_types(),
            client_data_types: default_client_data_types(),
            colors: default_colors(),
        }
    }
}

/// Panel animation lengths, in ticks at speed 1.0.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PanelConfig {
    /// Ticks for the database counter to reach its target.
    #[serde(default = "default_database_ticks")]
    pub database_ticks: u32,

    /// Ticks for every document to be revealed.
    #[serde(default = "default_knowledge_ticks")]
    pub knowledge_ticks: u32,

    /// Ticks for the client data merge.
    #[serde(default = "default_fusion_ticks")]
    pub fusion_ticks: u32,

    /// Ticks for the matched audience highlight.
    #[serde(default = "default_matching_ticks")]
    pub matching_ticks: u32,

    /// Ticks for every report section to be revealed.
    #[serde(default = "default_report_ticks")]
    pub report_ticks: u32,

    /// Number of report sections revealed in turn.
    #[serde(default = "default_report_sections")]
    pub report_sections: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            database_ticks: default_database_ticks(),
            knowledge_ticks: default_knowledge_ticks(),
            fusion_ticks: default_fusion_ticks(),
            matching_ticks: default_matching_ticks(),
            report_ticks: default_report_ticks(),
            report_sections: default_report_sections(),
        }
    }
}

/// Echo channel server and client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    /// Address the server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Reconnect attempts before the client reports itself unavailable.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Reconnect delay growth per attempt.
    #[serde(default = "default_reconnect_step_ms")]
    pub reconnect_step_ms: u64,

    /// Upper bound on the reconnect delay.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

impl ChannelConfig {
    /// Override the listen port with `PORT` when it is set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PORT") {
            match val.parse() {
                Ok(port) => self.port = port,
                Err(e) => warn!(value = %val, error = %e, "Ignoring invalid PORT"),
            }
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            reconnect_step_ms: default_reconnect_step_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_speed_factor() -> f64 {
    1.0
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_min_tick_interval_ms() -> u64 {
    10
}

const fn default_progress_per_second() -> f64 {
    1.0
}

const fn default_gate_timeout_ms() -> u64 {
    30_000
}

const fn default_reset_delay_ms() -> u64 {
    5_000
}

const fn default_seed() -> u64 {
    42
}

const fn default_max_audience_count() -> u64 {
    3_000_000
}

const fn default_audience_particle_count() -> usize {
    80
}

const fn default_document_particle_count() -> usize {
    60
}

const fn default_client_particle_count() -> usize {
    30
}

const fn default_max_particles_per_layer() -> usize {
    200
}

const fn default_match_ratio() -> f64 {
    0.25
}

const fn default_merge_ratio() -> f64 {
    0.6
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

fn default_audience_traits() -> Vec<String> {
    strings(&[
        "Interest: technology",
        "Spending power: high",
        "Occupation: professional",
        "Age: 25-34",
        "Device: iOS",
        "Purchase frequency: high",
        "Brand loyalty: medium",
        "Social activity: high",
        "Purchase decisions: fast",
        "Price sensitivity: low",
    ])
}

fn default_document_types() -> Vec<String> {
    strings(&[
        "Travel campaign results",
        "Tech product proposal",
        "Beauty brand case study",
        "Automotive marketing strategy",
        "Game app promotion",
        "Financial services plan",
        "Food and beverage marketing",
        "Fashion industry analysis",
        "E-commerce platform report",
        "Streaming media marketing",
        "Consumer behaviour survey",
        "Industry white paper",
    ])
}

fn default_client_data_types() -> Vec<String> {
    strings(&[
        "Purchase history",
        "Browsing behaviour",
        "Brand preference",
        "Account data",
        "Loyalty score",
        "Repurchase rate",
        "Churn risk",
        "Support interactions",
        "Price sensitivity",
        "Seasonal patterns",
    ])
}

fn default_colors() -> Vec<String> {
    strings(&["#ffbb00", "#ff8a00", "#ff5500", "#26c6da", "#00bcd4"])
}

const fn default_database_ticks() -> u32 {
    200
}

const fn default_knowledge_ticks() -> u32 {
    150
}

const fn default_fusion_ticks() -> u32 {
    150
}

const fn default_matching_ticks() -> u32 {
    120
}

const fn default_report_ticks() -> u32 {
    100
}

const fn default_report_sections() -> u32 {
    4
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    3000
}

const fn default_reconnect_max_attempts() -> u32 {
    5
}

const fn default_reconnect_step_ms() -> u64 {
    3_000
}

const fn default_reconnect_max_delay_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
