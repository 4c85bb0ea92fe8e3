//! Core presentation structs: stages, playback state, particles and the
//! snapshot published to observers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{LayerId, SignalId};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// What the sequencer does when a stage is entered.
///
/// Each variant carries only the fixtures it needs. The sequencer handles
/// all of them in a single exhaustive match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StageAction {
    /// Populate the consumer sphere and start the audience counter.
    ShowDatabase {
        /// Number of sphere particles to generate.
        particle_count: usize,
        /// Value the audience counter climbs to.
        audience_target: u64,
    },
    /// Populate the document cube.
    BuildKnowledgeBase {
        /// Number of document particles to generate.
        particle_count: usize,
    },
    /// Populate the client data panel.
    FuseClientData {
        /// Number of client data particles to generate.
        particle_count: usize,
        /// Fraction of particles that merge toward the centre.
        merge_ratio: f64,
    },
    /// Regenerate the audience and mark a fraction of it as matched.
    MatchAudience {
        /// Number of audience particles to generate.
        particle_count: usize,
        /// Fraction of particles flagged as matched.
        match_ratio: f64,
    },
    /// Show the analysis report overlay.
    GenerateReport,
}

/// One named step of the guided presentation.
///
/// Stages are immutable once the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Stage {
    /// Stable slug, e.g. `"database"`.
    pub id: String,
    /// Display label shown in the stage indicator.
    pub label: String,
    /// Technology caption shown next to the visualization.
    pub tech_label: String,
    /// Narration shown below the visualization.
    pub description: String,
    /// Progress percentage at which the stage may be entered.
    pub milestone: f64,
    /// Layers visible while this stage is current.
    pub visible_layers: BTreeSet<LayerId>,
    /// Work performed on entry.
    pub action: StageAction,
    /// Signal that must be satisfied before the presentation may leave
    /// this stage.
    #[serde(default)]
    pub completion_gate: Option<SignalId>,
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Mutable playback state owned by the sequencer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlaybackState {
    /// Index of the current stage in the catalog.
    pub current_stage_index: usize,
    /// Timeline progress in percent, `0.0..=100.0`.
    pub progress_percent: f64,
    /// Whether ticks are currently suppressed.
    pub is_paused: bool,
    /// Multiplier applied to every tick's progress delta.
    pub speed_factor: f64,
    /// Whether `start` has been called since the last reset.
    pub is_started: bool,
    /// Whether the final milestone has been reached.
    pub is_complete: bool,
    /// The gate the sequencer is holding on, if any.
    pub blocked_on: Option<SignalId>,
}

impl PlaybackState {
    /// Initial state for the given speed factor.
    pub const fn initial(speed_factor: f64) -> Self {
        Self {
            current_stage_index: 0,
            progress_percent: 0.0,
            is_paused: false,
            speed_factor,
            is_started: false,
            is_complete: false,
            blocked_on: None,
        }
    }
}

/// One ephemeral display object in a layer's particle set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Particle {
    /// Index within its set.
    pub id: u32,
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Depth.
    pub z: f64,
    /// Rendered size in pixels.
    pub size: f64,
    /// CSS hex color.
    pub color: String,
    /// Opacity, `0.0..=1.0`.
    pub opacity: f64,
    /// Caption (trait, document type or data type).
    pub label: Option<String>,
    /// Whether the caption is currently shown.
    pub label_visible: bool,
    /// Whether the particle is emphasised (matched, extracted, merging).
    pub highlighted: bool,
    /// Per-particle animation progress, `0.0..=1.0`.
    pub progress: f64,
}

/// Serializable view of the presentation published after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlaybackSnapshot {
    /// Index of the current stage.
    pub stage_index: usize,
    /// Number of stages in the catalog.
    pub stage_count: usize,
    /// Slug of the current stage.
    pub stage_id: String,
    /// Display label of the current stage (empty before start).
    pub label: String,
    /// Technology caption of the current stage.
    pub tech_label: String,
    /// Narration of the current stage.
    pub description: String,
    /// Timeline progress in percent.
    pub progress_percent: f64,
    /// Whether playback is paused.
    pub is_paused: bool,
    /// Whether playback has started.
    pub is_started: bool,
    /// Whether the final milestone has been reached.
    pub is_complete: bool,
    /// Current speed multiplier.
    pub speed_factor: f64,
    /// Gate the sequencer is holding on.
    pub blocked_on: Option<SignalId>,
    /// Layers currently shown.
    pub visible_layers: Vec<LayerId>,
    /// Satisfied flag of every completion signal.
    pub signals: BTreeMap<SignalId, bool>,
    /// Number of particles per layer.
    pub particle_counts: BTreeMap<LayerId, usize>,
    /// Value shown by the database counter.
    pub audience_count: u64,
    /// Number of times the presentation ran to completion.
    pub loops_completed: u64,
}

/// Something the sequencer did in response to a tick, signal or control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SequencerEvent {
    /// Playback started.
    Started,
    /// A stage became current.
    StageEntered {
        /// Index of the stage.
        index: usize,
        /// Slug of the stage.
        stage_id: String,
    },
    /// Progress reached the next milestone but the current gate is open.
    GateHeld {
        /// The unsatisfied gate.
        signal: SignalId,
        /// Progress at which playback holds.
        progress_percent: f64,
    },
    /// A gate was force-satisfied after the hold timeout.
    GateForced {
        /// The forced gate.
        signal: SignalId,
        /// Ticks spent holding.
        held_ticks: u64,
    },
    /// A completion signal went from unsatisfied to satisfied.
    SignalSatisfied {
        /// The signal.
        signal: SignalId,
    },
    /// The final milestone was reached.
    Completed,
    /// Playback paused.
    Paused,
    /// Playback resumed.
    Resumed,
    /// Playback reset to stage 0.
    Reset,
    /// The speed factor changed.
    SpeedChanged {
        /// New speed multiplier.
        speed_factor: f64,
    },
}
