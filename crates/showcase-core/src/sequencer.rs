//! The timeline sequencer.
//!
//! The sequencer owns the playback state and the completion signal
//! registry. It advances through the [`StageCatalog`] when progress
//! reaches the next stage's milestone *and* the current stage's gate is
//! satisfied, whichever happens last. While progress waits on a gate it is
//! clamped to the milestone.
//!
//! Every operation returns the [`SequencerEvent`]s it produced so the
//! caller can forward them without re-deriving what changed.
//!
//! A tick's base progress is `progress_per_second * period`, so the
//! sequencer recovers each tick's wall-clock length from it and measures
//! the gate timeout in real time whatever the speed factor.

use std::time::Duration;

use showcase_types::{
    LayerId, PlaybackSnapshot, PlaybackState, SequencerEvent, SignalId, Stage, StageAction,
};
use tracing::{debug, info, warn};

use crate::catalog::{COMPLETE_MILESTONE, StageCatalog};
use crate::config::{MAX_SPEED_FACTOR, MIN_SPEED_FACTOR, PresentationConfig};
use crate::signals::SignalRegistry;

/// Errors returned by sequencer operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SequencerError {
    /// Speed factor outside the accepted range.
    #[error("speed factor {requested} is outside {MIN_SPEED_FACTOR}..={MAX_SPEED_FACTOR}")]
    InvalidSpeed {
        /// The rejected factor.
        requested: f64,
    },
}

/// Drives the presentation through its stages.
#[derive(Debug, Clone)]
pub struct Sequencer {
    catalog: StageCatalog,
    signals: SignalRegistry,
    state: PlaybackState,
    gate_timeout: Option<Duration>,
    progress_per_second: f64,
    held_ticks: u64,
    held_for: Duration,
}

impl Sequencer {
    /// A stopped sequencer at stage 0.
    pub fn new(catalog: StageCatalog, config: &PresentationConfig) -> Self {
        Self {
            catalog,
            signals: SignalRegistry::new(),
            state: PlaybackState::initial(config.speed_factor),
            gate_timeout: config.gate_timeout(),
            progress_per_second: config.progress_per_second,
            held_ticks: 0,
            held_for: Duration::ZERO,
        }
    }

    /// Begin playback and enter stage 0. No-op once started.
    pub fn start(&mut self) -> Vec<SequencerEvent> {
        if self.state.is_started {
            return Vec::new();
        }
        self.state.is_started = true;
        info!(stages = self.catalog.len(), "Presentation started");
        let mut events = vec![SequencerEvent::Started];
        self.enter_stage(0, &mut events);
        events
    }

    /// Add `delta_progress * speed_factor` to progress and advance through
    /// any milestones crossed. Ignored while paused, stopped or complete.
    pub fn tick(&mut self, delta_progress: f64) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        if !self.is_running() {
            return events;
        }

        let delta = (delta_progress * self.state.speed_factor).max(0.0);
        self.state.progress_percent = (self.state.progress_percent + delta).min(COMPLETE_MILESTONE);

        if let Some(signal) = self.state.blocked_on {
            self.held_ticks = self.held_ticks.saturating_add(1);
            self.held_for = self
                .held_for
                .saturating_add(self.tick_length(delta_progress));
            if self.gate_timeout.is_some_and(|timeout| self.held_for >= timeout) {
                warn!(
                    %signal,
                    held_ticks = self.held_ticks,
                    held_ms = self.held_for.as_millis(),
                    stage = self.state.current_stage_index,
                    "Completion signal never arrived, forcing gate open"
                );
                self.signals.satisfy(signal);
                events.push(SequencerEvent::GateForced {
                    signal,
                    held_ticks: self.held_ticks,
                });
            }
        }

        self.try_advance(&mut events);
        events
    }

    /// Mark `signal` satisfied. If playback was held on exactly this
    /// signal it advances immediately (or on resume, when paused).
    pub fn report_signal(&mut self, signal: SignalId) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        if !self.signals.satisfy(signal) {
            debug!(%signal, "Signal already satisfied, ignoring");
            return events;
        }
        debug!(%signal, "Signal satisfied");
        events.push(SequencerEvent::SignalSatisfied { signal });

        if self.state.blocked_on == Some(signal) && self.is_running() {
            self.try_advance(&mut events);
        }
        events
    }

    /// Jump to the next stage, marking the current gate satisfied and
    /// raising progress to the next milestone. No-op at the last stage.
    pub fn advance(&mut self) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        if !self.state.is_started || self.state.is_complete {
            return events;
        }
        let index = self.state.current_stage_index;
        if index >= self.catalog.last_index() {
            debug!(index, "Advance requested at last stage, ignoring");
            return events;
        }

        if let Some(gate) = self.current_stage().and_then(|s| s.completion_gate) {
            if self.signals.satisfy(gate) {
                events.push(SequencerEvent::SignalSatisfied { signal: gate });
            }
        }

        let next = index.saturating_add(1);
        if let Some(milestone) = self.catalog.get(next).map(|s| s.milestone) {
            self.state.progress_percent = self.state.progress_percent.max(milestone);
        }
        info!(from = index, to = next, "Manual advance");
        self.enter_stage(next, &mut events);
        if !self.state.is_paused {
            self.try_advance(&mut events);
        }
        events
    }

    /// Suspend ticks. Progress is kept.
    pub fn pause(&mut self) -> Vec<SequencerEvent> {
        if self.state.is_paused {
            return Vec::new();
        }
        self.state.is_paused = true;
        info!(progress = self.state.progress_percent, "Presentation paused");
        vec![SequencerEvent::Paused]
    }

    /// Resume ticks, applying any signal that arrived while paused.
    pub fn resume(&mut self) -> Vec<SequencerEvent> {
        if !self.state.is_paused {
            return Vec::new();
        }
        self.state.is_paused = false;
        info!(progress = self.state.progress_percent, "Presentation resumed");
        let mut events = vec![SequencerEvent::Resumed];
        if self.is_running() {
            self.try_advance(&mut events);
        }
        events
    }

    /// Clear every signal, restore the initial state and re-enter stage 0.
    /// The speed factor is kept.
    pub fn reset(&mut self) -> Vec<SequencerEvent> {
        self.signals.clear_all();
        self.state = PlaybackState::initial(self.state.speed_factor);
        self.state.is_started = true;
        self.held_ticks = 0;
        self.held_for = Duration::ZERO;
        info!("Presentation reset");
        let mut events = vec![SequencerEvent::Reset];
        self.enter_stage(0, &mut events);
        events
    }

    /// Change the speed multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::InvalidSpeed`] for factors outside
    /// `0.1..=10.0`; the current speed is left unchanged.
    pub fn set_speed(&mut self, factor: f64) -> Result<Vec<SequencerEvent>, SequencerError> {
        if !(MIN_SPEED_FACTOR..=MAX_SPEED_FACTOR).contains(&factor) {
            return Err(SequencerError::InvalidSpeed { requested: factor });
        }
        self.state.speed_factor = factor;
        info!(speed_factor = factor, "Speed changed");
        Ok(vec![SequencerEvent::SpeedChanged {
            speed_factor: factor,
        }])
    }

    /// Current playback state.
    pub const fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Completion signal flags.
    pub const fn signals(&self) -> &SignalRegistry {
        &self.signals
    }

    /// The stage catalog.
    pub const fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// Stage at the current index.
    pub fn current_stage(&self) -> Option<&Stage> {
        self.catalog.get(self.state.current_stage_index)
    }

    /// Serializable view of the sequencer. Panel-owned fields (particle
    /// counts and the audience counter) are zero; the runner fills them.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        let stage = self.current_stage();
        PlaybackSnapshot {
            stage_index: self.state.current_stage_index,
            stage_count: self.catalog.len(),
            stage_id: stage.map(|s| s.id.clone()).unwrap_or_default(),
            label: stage.map(|s| s.label.clone()).unwrap_or_default(),
            tech_label: stage.map(|s| s.tech_label.clone()).unwrap_or_default(),
            description: stage.map(|s| s.description.clone()).unwrap_or_default(),
            progress_percent: self.state.progress_percent,
            is_paused: self.state.is_paused,
            is_started: self.state.is_started,
            is_complete: self.state.is_complete,
            speed_factor: self.state.speed_factor,
            blocked_on: self.state.blocked_on,
            visible_layers: stage
                .map(|s| s.visible_layers.iter().copied().collect())
                .unwrap_or_default(),
            signals: self.signals.states(),
            particle_counts: LayerId::ALL.into_iter().map(|l| (l, 0)).collect(),
            audience_count: 0,
            loops_completed: 0,
        }
    }

    /// Wall-clock length of the tick that carried `delta_progress`.
    fn tick_length(&self, delta_progress: f64) -> Duration {
        Duration::try_from_secs_f64(delta_progress / self.progress_per_second).unwrap_or_default()
    }

    const fn is_running(&self) -> bool {
        self.state.is_started && !self.state.is_paused && !self.state.is_complete
    }

    /// Milestone that ends the current stage: the next stage's entry
    /// milestone, or completion after the last stage.
    fn exit_milestone(&self) -> f64 {
        self.catalog
            .get(self.state.current_stage_index.saturating_add(1))
            .map_or(COMPLETE_MILESTONE, |s| s.milestone)
    }

    fn try_advance(&mut self, events: &mut Vec<SequencerEvent>) {
        loop {
            let milestone = self.exit_milestone();
            if self.state.progress_percent < milestone {
                self.state.blocked_on = None;
                return;
            }

            let gate = self.current_stage().and_then(|s| s.completion_gate);
            if let Some(signal) = gate.filter(|g| !self.signals.is_satisfied(*g)) {
                self.state.progress_percent = milestone;
                if self.state.blocked_on != Some(signal) {
                    self.state.blocked_on = Some(signal);
                    self.held_ticks = 0;
                    self.held_for = Duration::ZERO;
                    info!(%signal, progress = milestone, "Holding for completion signal");
                    events.push(SequencerEvent::GateHeld {
                        signal,
                        progress_percent: milestone,
                    });
                }
                return;
            }

            self.state.blocked_on = None;
            self.held_ticks = 0;
            self.held_for = Duration::ZERO;
            if self.state.current_stage_index >= self.catalog.last_index() {
                self.state.progress_percent = COMPLETE_MILESTONE;
                self.state.is_complete = true;
                info!("Presentation complete");
                events.push(SequencerEvent::Completed);
                return;
            }
            let next = self.state.current_stage_index.saturating_add(1);
            self.enter_stage(next, events);
        }
    }

    fn enter_stage(&mut self, index: usize, events: &mut Vec<SequencerEvent>) {
        self.state.current_stage_index = index;
        self.state.blocked_on = None;
        self.held_ticks = 0;
        self.held_for = Duration::ZERO;

        let Some(stage) = self.catalog.get(index) else {
            return;
        };
        if let Some(gate) = stage.completion_gate {
            self.signals.reset(gate);
        }
        info!(
            index,
            stage = %stage.id,
            label = %stage.label,
            tech_label = %stage.tech_label,
            layers = ?stage.visible_layers,
            "Entering stage"
        );
        log_action(&stage.action);
        events.push(SequencerEvent::StageEntered {
            index,
            stage_id: stage.id.clone(),
        });
    }
}

fn log_action(action: &StageAction) {
    match action {
        StageAction::ShowDatabase {
            particle_count,
            audience_target,
        } => debug!(particle_count, audience_target, "Showing consumer database"),
        StageAction::BuildKnowledgeBase { particle_count } => {
            debug!(particle_count, "Building knowledge base");
        }
        StageAction::FuseClientData {
            particle_count,
            merge_ratio,
        } => debug!(particle_count, merge_ratio, "Fusing client data"),
        StageAction::MatchAudience {
            particle_count,
            match_ratio,
        } => debug!(particle_count, match_ratio, "Matching audience"),
        StageAction::GenerateReport => debug!("Generating report"),
    }
}
