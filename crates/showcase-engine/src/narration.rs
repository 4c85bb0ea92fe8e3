//! Presentation callback that narrates playback to the log.
//!
//! Stage changes, gate holds and loop completions are logged at `info`
//! with the stage's display label. Every other update is logged at
//! `trace` so a `RUST_LOG=showcase_engine=trace` run shows the timeline.

use showcase_core::presentation::PresentationCallback;
use showcase_types::{PlaybackSnapshot, SequencerEvent};
use tracing::{info, trace, warn};

/// Callback that logs what the audience would be seeing.
#[derive(Debug, Default)]
pub struct NarrationCallback;

impl NarrationCallback {
    /// Create a narrator.
    pub const fn new() -> Self {
        Self
    }
}

impl PresentationCallback for NarrationCallback {
    fn on_update(&mut self, snapshot: &PlaybackSnapshot, events: &[SequencerEvent]) {
        for event in events {
            match event {
                SequencerEvent::StageEntered { index, stage_id } => info!(
                    index,
                    stage_id = %stage_id,
                    label = %snapshot.label,
                    tech = %snapshot.tech_label,
                    "{}",
                    snapshot.description
                ),
                SequencerEvent::GateHeld {
                    signal,
                    progress_percent,
                } => info!(%signal, progress_percent, "Waiting for panel to finish"),
                SequencerEvent::GateForced { signal, held_ticks } => {
                    warn!(%signal, held_ticks, "Panel never finished, moving on");
                }
                SequencerEvent::Completed => info!(
                    audience = snapshot.audience_count,
                    loops_completed = snapshot.loops_completed,
                    "Presentation complete"
                ),
                other => trace!(event = ?other, "Sequencer event"),
            }
        }

        trace!(
            stage = snapshot.stage_index,
            progress = snapshot.progress_percent,
            paused = snapshot.is_paused,
            "Playback update"
        );
    }
}
