//! Timer ownership for a running presentation.
//!
//! A [`Scheduler`] holds the periodic tick interval and the one-shot
//! restart delay. Replacing or dropping either cancels it; nothing else
//! in the crate creates timers, so pausing or resetting can never leave
//! a stray callback behind.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, Sleep};

use crate::config::PresentationConfig;

/// Tick period and per-tick progress derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSchedule {
    tick_interval_ms: u64,
    min_tick_interval_ms: u64,
    progress_per_second: f64,
}

impl TickSchedule {
    /// Derive the schedule from presentation settings.
    pub const fn from_config(config: &PresentationConfig) -> Self {
        Self {
            tick_interval_ms: config.tick_interval_ms,
            min_tick_interval_ms: config.min_tick_interval_ms,
            progress_per_second: config.progress_per_second,
        }
    }

    /// Tick period at `speed`: the base interval divided by speed, never
    /// shorter than the configured minimum.
    pub fn period(&self, speed_factor: f64) -> Duration {
        let base = Duration::from_millis(self.tick_interval_ms);
        let floor = Duration::from_millis(self.min_tick_interval_ms.max(1));
        let scaled = if speed_factor.is_finite() && speed_factor > 0.0 {
            Duration::try_from_secs_f64(base.as_secs_f64() / speed_factor).unwrap_or(base)
        } else {
            base
        };
        scaled.max(floor)
    }

    /// Progress to feed the sequencer per tick at `speed`. The sequencer
    /// multiplies by speed itself, so the effective rate is
    /// `progress_per_second * speed` regardless of tick granularity.
    pub fn delta(&self, speed_factor: f64) -> f64 {
        self.progress_per_second * self.period(speed_factor).as_secs_f64()
    }
}

/// What woke the runner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wakeup {
    /// The tick interval fired; feed `delta` to the sequencer.
    Tick {
        /// Base progress for this tick.
        delta: f64,
    },
    /// The restart delay after completion elapsed.
    Restart,
}

/// Single owner of every presentation timer.
#[derive(Debug)]
pub struct Scheduler {
    schedule: TickSchedule,
    speed_factor: f64,
    interval: Option<Interval>,
    restart: Option<Pin<Box<Sleep>>>,
}

impl Scheduler {
    /// A scheduler with no timers armed.
    pub const fn new(schedule: TickSchedule) -> Self {
        Self {
            schedule,
            speed_factor: 1.0,
            interval: None,
            restart: None,
        }
    }

    /// (Re)arm the tick interval at `speed`, dropping any previous one.
    /// The first tick fires one period from now.
    pub fn start_ticks(&mut self, speed_factor: f64) {
        let period = self.schedule.period(speed_factor);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick.
        interval.reset();
        self.speed_factor = speed_factor;
        self.interval = Some(interval);
    }

    /// Cancel the tick interval.
    pub fn stop_ticks(&mut self) {
        self.interval = None;
    }

    /// Arm the restart delay, replacing any pending one.
    pub fn schedule_restart(&mut self, delay: Duration) {
        self.restart = Some(Box::pin(tokio::time::sleep(delay)));
    }

    /// Cancel a pending restart.
    pub fn cancel_restart(&mut self) {
        self.restart = None;
    }

    /// Cancel every timer.
    pub fn stop(&mut self) {
        self.stop_ticks();
        self.cancel_restart();
    }

    /// Whether the tick interval is armed.
    pub const fn is_ticking(&self) -> bool {
        self.interval.is_some()
    }

    /// Whether a restart is pending.
    pub const fn restart_pending(&self) -> bool {
        self.restart.is_some()
    }

    /// Current tick period.
    pub fn period(&self) -> Duration {
        self.schedule.period(self.speed_factor)
    }

    /// Wait for the next armed timer. Pends forever when none is armed.
    pub async fn next(&mut self) -> Wakeup {
        let delta = self.schedule.delta(self.speed_factor);
        let interval = &mut self.interval;
        let restart = &mut self.restart;

        let woke = tokio::select! {
            () = async {
                match interval.as_mut() {
                    Some(i) => {
                        i.tick().await;
                    }
                    None => future::pending::<()>().await,
                }
            } => Wakeup::Tick { delta },
            () = async {
                match restart.as_mut() {
                    Some(sleep) => sleep.await,
                    None => future::pending::<()>().await,
                }
            } => Wakeup::Restart,
        };

        if woke == Wakeup::Restart {
            self.restart = None;
        }
        woke
    }
}
