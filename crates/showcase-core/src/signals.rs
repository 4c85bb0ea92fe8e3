//! Completion signals: the registry the sequencer gates on, and the bus
//! panels report through.

use std::collections::BTreeMap;

use showcase_types::SignalId;
use tokio::sync::mpsc;
use tracing::trace;

/// Satisfied flags for every completion signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRegistry {
    satisfied: BTreeMap<SignalId, bool>,
}

impl SignalRegistry {
    /// A registry with every signal unsatisfied.
    pub fn new() -> Self {
        Self {
            satisfied: SignalId::ALL.into_iter().map(|s| (s, false)).collect(),
        }
    }

    /// Clear one signal.
    pub fn reset(&mut self, signal: SignalId) {
        self.satisfied.insert(signal, false);
    }

    /// Mark a signal satisfied.
    ///
    /// Returns `true` only on the unsatisfied to satisfied edge; repeated
    /// calls are no-ops returning `false`.
    pub fn satisfy(&mut self, signal: SignalId) -> bool {
        let flag = self.satisfied.entry(signal).or_insert(false);
        let changed = !*flag;
        *flag = true;
        changed
    }

    /// Whether the signal is currently satisfied.
    pub fn is_satisfied(&self, signal: SignalId) -> bool {
        self.satisfied.get(&signal).copied().unwrap_or(false)
    }

    /// Clear every signal.
    pub fn clear_all(&mut self) {
        for flag in self.satisfied.values_mut() {
            *flag = false;
        }
    }

    /// Copy of every flag, keyed by signal.
    pub fn states(&self) -> BTreeMap<SignalId, bool> {
        SignalId::ALL
            .into_iter()
            .map(|s| (s, self.is_satisfied(s)))
            .collect()
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending half handed to each panel.
#[derive(Debug, Clone)]
pub struct SignalBus {
    tx: mpsc::UnboundedSender<SignalId>,
}

/// Receiving half drained by the presentation runner.
#[derive(Debug)]
pub struct SignalInbox {
    rx: mpsc::UnboundedReceiver<SignalId>,
}

impl SignalBus {
    /// Create a connected bus and inbox.
    pub fn channel() -> (Self, SignalInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, SignalInbox { rx })
    }

    /// Report a completed animation.
    pub fn report(&self, signal: SignalId) {
        if self.tx.send(signal).is_err() {
            trace!(%signal, "Signal inbox closed, dropping report");
        }
    }
}

impl SignalInbox {
    /// Take every signal reported since the last drain, in order.
    pub fn drain(&mut self) -> Vec<SignalId> {
        let mut signals = Vec::new();
        while let Ok(signal) = self.rx.try_recv() {
            signals.push(signal);
        }
        signals
    }
}
