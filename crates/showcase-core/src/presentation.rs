//! The presentation runner and its control handle.
//!
//! [`Presentation`] owns every piece of mutable playback state: the
//! sequencer, the panels, the signal inbox and the scheduler. It runs on
//! one task. Everything else talks to it through a cloneable
//! [`PresentationHandle`], which sends [`Command`]s and reads snapshots
//! from a `watch` channel.
//!
//! Each wakeup is handled in a fixed order: tick the sequencer, sync the
//! panels to the visible layers, update the active panels, drain the
//! signal bus into the sequencer, publish a snapshot, then invoke the
//! [`PresentationCallback`].

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use showcase_types::{PlaybackSnapshot, SequencerEvent, SignalId};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, StageCatalog};
use crate::config::ShowcaseConfig;
use crate::panels::PanelSet;
use crate::scheduler::{Scheduler, TickSchedule, Wakeup};
use crate::sequencer::{Sequencer, SequencerError};
use crate::signals::{SignalBus, SignalInbox};

/// Capacity of the command channel.
const COMMAND_CAPACITY: usize = 64;

/// Shortest pause between completion and the automatic restart.
pub const MIN_RESTART_DELAY: Duration = Duration::from_secs(1);

/// Restart delay at `speed_factor`: the configured delay divided by speed,
/// floored to whole milliseconds and never below [`MIN_RESTART_DELAY`].
pub fn restart_delay(reset_delay: Duration, speed_factor: f64) -> Duration {
    let scaled = if speed_factor.is_finite() && speed_factor > 0.0 {
        Duration::try_from_secs_f64(reset_delay.as_secs_f64() / speed_factor)
            .unwrap_or(reset_delay)
    } else {
        reset_delay
    };
    let whole_ms = u64::try_from(scaled.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(whole_ms).max(MIN_RESTART_DELAY)
}

/// Errors returned by the presentation handle.
#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    /// The runner task has ended.
    #[error("presentation runner has stopped")]
    Closed,

    /// The sequencer rejected the command.
    #[error("sequencer rejected command: {source}")]
    Sequencer {
        /// The underlying sequencer error.
        #[from]
        source: SequencerError,
    },

    /// The stage catalog failed validation.
    #[error("invalid stage catalog: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: CatalogError,
    },
}

/// Control messages accepted by the runner.
#[derive(Debug)]
pub enum Command {
    /// Suspend ticks and panel animation.
    Pause,
    /// Resume after a pause.
    Resume,
    /// Restart from stage 0.
    Reset,
    /// Jump to the next stage.
    Advance,
    /// Report a completion signal from outside the panels.
    ReportSignal(SignalId),
    /// Change the speed factor.
    SetSpeed {
        /// Requested factor.
        factor: f64,
        /// Outcome of the change.
        reply: oneshot::Sender<Result<(), SequencerError>>,
    },
    /// End the run.
    Stop,
}

/// Reason the presentation run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationEndReason {
    /// A stop was requested through a handle.
    OperatorStop,
    /// Every handle was dropped.
    HandlesDropped,
    /// The presentation completed with looping disabled.
    Completed,
}

/// Outcome of a presentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationResult {
    /// Why the run ended.
    pub end_reason: PresentationEndReason,
    /// Tick wakeups handled.
    pub total_ticks: u64,
    /// Number of times the presentation reached completion.
    pub loops_completed: u64,
}

/// Observer invoked after each handled wakeup.
pub trait PresentationCallback: Send {
    /// Called with the freshly published snapshot and the events the
    /// wakeup produced (possibly none).
    fn on_update(&mut self, snapshot: &PlaybackSnapshot, events: &[SequencerEvent]);
}

/// A callback that does nothing.
pub struct NoOpCallback;

impl PresentationCallback for NoOpCallback {
    fn on_update(&mut self, _snapshot: &PlaybackSnapshot, _events: &[SequencerEvent]) {}
}

/// Cloneable control surface for a running presentation.
#[derive(Debug, Clone)]
pub struct PresentationHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
}

impl PresentationHandle {
    async fn send(&self, command: Command) -> Result<(), PresentationError> {
        self.commands
            .send(command)
            .await
            .map_err(|_closed| PresentationError::Closed)
    }

    /// Pause playback.
    pub async fn pause(&self) -> Result<(), PresentationError> {
        self.send(Command::Pause).await
    }

    /// Resume playback.
    pub async fn resume(&self) -> Result<(), PresentationError> {
        self.send(Command::Resume).await
    }

    /// Reset to stage 0 and play again.
    pub async fn reset(&self) -> Result<(), PresentationError> {
        self.send(Command::Reset).await
    }

    /// Skip to the next stage.
    pub async fn advance(&self) -> Result<(), PresentationError> {
        self.send(Command::Advance).await
    }

    /// Report a completion signal.
    pub async fn report_signal(&self, signal: SignalId) -> Result<(), PresentationError> {
        self.send(Command::ReportSignal(signal)).await
    }

    /// Change the speed factor, waiting for the runner to accept it.
    ///
    /// # Errors
    ///
    /// Returns [`PresentationError::Sequencer`] for an out-of-range factor
    /// and [`PresentationError::Closed`] if the runner has ended.
    pub async fn set_speed(&self, factor: f64) -> Result<(), PresentationError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetSpeed { factor, reply }).await?;
        rx.await.map_err(|_dropped| PresentationError::Closed)??;
        Ok(())
    }

    /// Ask the runner to stop.
    pub async fn stop(&self) -> Result<(), PresentationError> {
        self.send(Command::Stop).await
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// The presentation runner. Construct with [`Presentation::new`] and
/// drive with [`Presentation::run`], or use [`Presentation::spawn`].
pub struct Presentation {
    sequencer: Sequencer,
    panels: PanelSet,
    inbox: SignalInbox,
    scheduler: Scheduler,
    rng: StdRng,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<PlaybackSnapshot>,
    reset_delay: Duration,
    loop_playback: bool,
    total_ticks: u64,
    loops_completed: u64,
    completion_handled: bool,
}

impl Presentation {
    /// Build a runner and its first handle from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PresentationError::Catalog`] if the configured stages are
    /// invalid.
    pub fn new(config: &ShowcaseConfig) -> Result<(Self, PresentationHandle), PresentationError> {
        let catalog = StageCatalog::from_config(config)?;
        let presentation = &config.presentation;
        let sequencer = Sequencer::new(catalog, presentation);
        let (bus, inbox) = SignalBus::channel();
        let panels = PanelSet::new(&config.fixtures, &config.panels, &bus);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(sequencer.snapshot());

        let runner = Self {
            sequencer,
            panels,
            inbox,
            scheduler: Scheduler::new(TickSchedule::from_config(presentation)),
            rng: StdRng::seed_from_u64(presentation.seed),
            commands: command_rx,
            snapshots: snapshot_tx,
            reset_delay: Duration::from_millis(presentation.reset_delay_ms),
            loop_playback: presentation.loop_playback,
            total_ticks: 0,
            loops_completed: 0,
            completion_handled: false,
        };
        let handle = PresentationHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        Ok((runner, handle))
    }

    /// Build a runner and run it on a new task.
    ///
    /// # Errors
    ///
    /// Returns [`PresentationError::Catalog`] if the configured stages are
    /// invalid.
    pub fn spawn(
        config: &ShowcaseConfig,
        mut callback: impl PresentationCallback + 'static,
    ) -> Result<(PresentationHandle, JoinHandle<PresentationResult>), PresentationError> {
        let (runner, handle) = Self::new(config)?;
        let task = tokio::spawn(async move { runner.run(&mut callback).await });
        Ok((handle, task))
    }

    /// Start playback and run until stopped, abandoned or (without
    /// looping) complete.
    pub async fn run(mut self, callback: &mut dyn PresentationCallback) -> PresentationResult {
        info!(
            stages = self.sequencer.catalog().len(),
            speed_factor = self.sequencer.state().speed_factor,
            loop_playback = self.loop_playback,
            "Presentation runner starting"
        );

        let events = self.sequencer.start();
        self.scheduler.start_ticks(self.sequencer.state().speed_factor);
        if let Some(reason) = self.finish_wakeup(events, callback) {
            return self.end(reason);
        }

        loop {
            let events = tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    None => {
                        info!("All presentation handles dropped");
                        return self.end(PresentationEndReason::HandlesDropped);
                    }
                    Some(Command::Stop) => {
                        info!("Presentation stop requested");
                        return self.end(PresentationEndReason::OperatorStop);
                    }
                    Some(command) => self.apply(command),
                },
                wakeup = self.scheduler.next() => match wakeup {
                    Wakeup::Tick { delta } => self.on_tick(delta),
                    Wakeup::Restart => {
                        info!(loops_completed = self.loops_completed, "Restarting presentation");
                        self.restart()
                    }
                },
            };

            if let Some(reason) = self.finish_wakeup(events, callback) {
                return self.end(reason);
            }
        }
    }

    fn on_tick(&mut self, delta: f64) -> Vec<SequencerEvent> {
        self.total_ticks = self.total_ticks.saturating_add(1);
        let mut events = self.sequencer.tick(delta);
        self.sync_panels();
        self.panels.update(&mut self.rng);
        for signal in self.inbox.drain() {
            events.extend(self.sequencer.report_signal(signal));
        }
        events
    }

    fn apply(&mut self, command: Command) -> Vec<SequencerEvent> {
        debug!(?command, "Applying presentation command");
        match command {
            Command::Pause => {
                let events = self.sequencer.pause();
                self.scheduler.stop();
                events
            }
            Command::Resume => {
                let events = self.sequencer.resume();
                self.rearm();
                events
            }
            Command::Reset => self.restart(),
            Command::Advance => self.sequencer.advance(),
            Command::ReportSignal(signal) => self.sequencer.report_signal(signal),
            Command::SetSpeed { factor, reply } => {
                let outcome = self.sequencer.set_speed(factor);
                let (events, result) = match outcome {
                    Ok(events) => {
                        if self.scheduler.is_ticking() {
                            self.scheduler.start_ticks(factor);
                        }
                        (events, Ok(()))
                    }
                    Err(e) => {
                        warn!(error = %e, "Rejected speed change");
                        (Vec::new(), Err(e))
                    }
                };
                if reply.send(result).is_err() {
                    debug!("Speed change requester went away");
                }
                events
            }
            // Handled by the run loop.
            Command::Stop => Vec::new(),
        }
    }

    /// Cancel every timer, clear panels and signals, and play from stage 0.
    fn restart(&mut self) -> Vec<SequencerEvent> {
        self.scheduler.stop();
        self.panels.deactivate_all();
        let _stale = self.inbox.drain();
        self.completion_handled = false;
        let events = self.sequencer.reset();
        self.scheduler.start_ticks(self.sequencer.state().speed_factor);
        events
    }

    /// Re-arm the timer that matches the current state after a resume.
    fn rearm(&mut self) {
        let state = self.sequencer.state();
        if state.is_paused || !state.is_started {
            return;
        }
        if state.is_complete {
            if self.loop_playback {
                let delay = restart_delay(self.reset_delay, state.speed_factor);
                self.scheduler.schedule_restart(delay);
            }
        } else {
            self.scheduler.start_ticks(state.speed_factor);
        }
    }

    /// Sync panels, publish, notify, and handle completion. Returns an end
    /// reason when the run should stop.
    fn finish_wakeup(
        &mut self,
        events: Vec<SequencerEvent>,
        callback: &mut dyn PresentationCallback,
    ) -> Option<PresentationEndReason> {
        self.sync_panels();

        let mut end = None;
        if self.sequencer.state().is_complete && !self.completion_handled {
            self.completion_handled = true;
            self.loops_completed = self.loops_completed.saturating_add(1);
            self.scheduler.stop_ticks();
            if self.loop_playback {
                let delay = restart_delay(self.reset_delay, self.sequencer.state().speed_factor);
                info!(
                    delay_ms = delay.as_millis(),
                    "Presentation complete, scheduling restart"
                );
                self.scheduler.schedule_restart(delay);
            } else {
                end = Some(PresentationEndReason::Completed);
            }
        }

        let snapshot = self.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        callback.on_update(&snapshot, &events);
        end
    }

    fn sync_panels(&mut self) {
        if !self.sequencer.state().is_started {
            return;
        }
        if let Some(stage) = self.sequencer.current_stage() {
            self.panels.sync(stage, &mut self.rng);
        }
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            particle_counts: self.panels.particle_counts(),
            audience_count: self.panels.audience_count(),
            loops_completed: self.loops_completed,
            ..self.sequencer.snapshot()
        }
    }

    fn end(mut self, reason: PresentationEndReason) -> PresentationResult {
        self.scheduler.stop();
        self.panels.deactivate_all();
        self.result(reason)
    }

    const fn result(&self, end_reason: PresentationEndReason) -> PresentationResult {
        PresentationResult {
            end_reason,
            total_ticks: self.total_ticks,
            loops_completed: self.loops_completed,
        }
    }
}

/// Log the end of a presentation run.
pub fn log_presentation_end(result: &PresentationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        loops_completed = result.loops_completed,
        "Presentation ended"
    );
    if result.total_ticks == 0 {
        warn!("Presentation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::config::{PanelConfig, PresentationConfig};

    /// Fast playback: 2% per 100 ms tick, five-tick panel animations.
    fn fast_config(loop_playback: bool) -> ShowcaseConfig {
        ShowcaseConfig {
            presentation: PresentationConfig {
                progress_per_second: 20.0,
                gate_timeout_ms: 0,
                reset_delay_ms: 1_000,
                loop_playback,
                ..PresentationConfig::default()
            },
            panels: PanelConfig {
                database_ticks: 5,
                knowledge_ticks: 5,
                fusion_ticks: 5,
                matching_ticks: 5,
                report_ticks: 5,
                report_sections: 4,
            },
            ..ShowcaseConfig::default()
        }
    }

    /// Panels that never finish inside a test.
    fn stalled_config() -> ShowcaseConfig {
        let mut config = fast_config(false);
        config.panels.database_ticks = 1_000_000;
        config
    }

    struct CountingCallback(Arc<AtomicU64>);

    impl PresentationCallback for CountingCallback {
        fn on_update(&mut self, _snapshot: &PlaybackSnapshot, _events: &[SequencerEvent]) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn plays_through_and_completes_without_looping() {
        let calls = Arc::new(AtomicU64::new(0));
        let (handle, task) =
            Presentation::spawn(&fast_config(false), CountingCallback(Arc::clone(&calls))).unwrap();
        let result = task.await.unwrap();

        assert_eq!(result.end_reason, PresentationEndReason::Completed);
        assert_eq!(result.loops_completed, 1);
        assert!(result.total_ticks >= 50);
        assert!(calls.load(Ordering::Relaxed) > result.total_ticks);

        let snap = handle.snapshot();
        assert!(snap.is_complete);
        assert_eq!(snap.stage_index, 4);
        assert!(snap.signals.values().all(|v| *v));
        assert!(handle.pause().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_progress() {
        let (handle, _task) = Presentation::spawn(&stalled_config(), NoOpCallback).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let frozen = handle.snapshot();
        assert!(frozen.is_paused);
        assert!(frozen.progress_percent > 0.0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let still = handle.snapshot();
        assert!((still.progress_percent - frozen.progress_percent).abs() < f64::EPSILON);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.snapshot().progress_percent > frozen.progress_percent);
    }

    #[tokio::test(start_paused = true)]
    async fn external_signal_releases_gate() {
        let (handle, _task) = Presentation::spawn(&stalled_config(), NoOpCallback).unwrap();
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.blocked_on == Some(SignalId::SphereComplete))
            .await
            .unwrap();

        handle.report_signal(SignalId::SphereComplete).await.unwrap();
        let snap = rx.wait_for(|s| s.stage_index == 1).await.unwrap().clone();
        assert_eq!(snap.stage_id, "knowledge_base");
        assert_eq!(snap.particle_counts.get(&showcase_types::LayerId::Sphere), Some(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn loops_after_reset_delay() {
        let (handle, task) = Presentation::spawn(&fast_config(true), NoOpCallback).unwrap();
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.loops_completed == 1 && !s.is_complete && s.stage_index == 0)
            .await
            .unwrap();

        handle.stop().await.unwrap();
        let result = task.await.unwrap();
        assert_eq!(result.end_reason, PresentationEndReason::OperatorStop);
        assert_eq!(result.loops_completed, 1);
    }

    #[test]
    fn restart_delay_scales_with_speed() {
        let base = Duration::from_millis(5_000);
        assert_eq!(restart_delay(base, 1.0), base);
        assert_eq!(restart_delay(base, 2.0), Duration::from_millis(2_500));
        assert_eq!(restart_delay(base, 3.0), Duration::from_millis(1_666));
        assert_eq!(restart_delay(base, 0.5), Duration::from_secs(10));
    }

    #[test]
    fn restart_delay_never_drops_below_one_second() {
        assert_eq!(restart_delay(Duration::from_millis(5_000), 10.0), MIN_RESTART_DELAY);
        assert_eq!(restart_delay(Duration::from_millis(200), 1.0), MIN_RESTART_DELAY);
    }

    /// Virtual time from completion to the automatic restart.
    async fn measured_restart_delay(speed_factor: f64) -> Duration {
        let mut config = fast_config(true);
        config.presentation.reset_delay_ms = 5_000;
        config.presentation.speed_factor = speed_factor;
        let (handle, _task) = Presentation::spawn(&config, NoOpCallback).unwrap();
        let mut rx = handle.subscribe();

        rx.wait_for(|s| s.is_complete).await.unwrap();
        let completed_at = tokio::time::Instant::now();
        rx.wait_for(|s| s.loops_completed == 1 && !s.is_complete)
            .await
            .unwrap();
        completed_at.elapsed()
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_scaled_delay() {
        let elapsed = measured_restart_delay(2.0).await;
        assert!(
            elapsed >= Duration::from_millis(2_500) && elapsed < Duration::from_millis(2_600),
            "restarted after {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_delay_is_floored_at_high_speed() {
        let elapsed = measured_restart_delay(10.0).await;
        assert!(
            elapsed >= MIN_RESTART_DELAY && elapsed < Duration::from_millis(1_100),
            "restarted after {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gate_timeout_holds_for_configured_time_at_any_speed() {
        for speed_factor in [0.5, 10.0] {
            let mut config = stalled_config();
            config.presentation.gate_timeout_ms = 3_000;
            config.presentation.speed_factor = speed_factor;
            let (handle, _task) = Presentation::spawn(&config, NoOpCallback).unwrap();
            let mut rx = handle.subscribe();

            rx.wait_for(|s| s.blocked_on == Some(SignalId::SphereComplete))
                .await
                .unwrap();
            let held_at = tokio::time::Instant::now();
            rx.wait_for(|s| s.stage_index == 1).await.unwrap();
            let held = held_at.elapsed();

            // Within one tick period of the configured timeout.
            assert!(
                held >= Duration::from_millis(2_790) && held <= Duration::from_millis(3_210),
                "speed {speed_factor}: forced after {held:?}"
            );
            handle.stop().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn manual_advance_and_reset() {
        let (handle, _task) = Presentation::spawn(&stalled_config(), NoOpCallback).unwrap();
        let mut rx = handle.subscribe();

        handle.advance().await.unwrap();
        rx.wait_for(|s| s.stage_index == 1).await.unwrap();

        handle.reset().await.unwrap();
        let snap = rx
            .wait_for(|s| s.stage_index == 0 && s.progress_percent < 5.0)
            .await
            .unwrap()
            .clone();
        assert!(!snap.signals.values().any(|v| *v));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_invalid_speed() {
        let (handle, _task) = Presentation::spawn(&stalled_config(), NoOpCallback).unwrap();
        let err = handle.set_speed(25.0).await.unwrap_err();
        assert!(matches!(err, PresentationError::Sequencer { .. }));

        handle.set_speed(2.0).await.unwrap();
        let mut rx = handle.subscribe();
        rx.wait_for(|s| (s.speed_factor - 2.0).abs() < f64::EPSILON)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_ends_run() {
        let (handle, task) = Presentation::spawn(&stalled_config(), NoOpCallback).unwrap();
        drop(handle);
        let result = task.await.unwrap();
        assert_eq!(result.end_reason, PresentationEndReason::HandlesDropped);
    }

    #[test]
    fn invalid_catalog_is_rejected() {
        let mut config = ShowcaseConfig::default();
        config.stages = Some(Vec::new());
        assert!(matches!(
            Presentation::new(&config),
            Err(PresentationError::Catalog { .. })
        ));
    }
}
