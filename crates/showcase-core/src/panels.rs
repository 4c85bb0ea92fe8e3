//! Visual layer panels.
//!
//! Each panel owns the particle set of one layer and runs a short local
//! animation while its layer is visible. When that animation finishes the
//! panel reports its completion signal on the [`SignalBus`], exactly once
//! per activation. Inactive panels do nothing.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::seq::index;
use showcase_types::{LayerId, Particle, Stage, StageAction};
use tracing::debug;

use crate::config::{FixtureConfig, PanelConfig};
use crate::particles::{Layout, Palette, ParticleSet};
use crate::signals::SignalBus;

/// Rotation applied per tick to the sphere and cube, in radians.
const ROTATION_STEP: f64 = 0.01;

/// The contract every visual layer implements.
pub trait Panel: Send {
    /// Layer this panel draws.
    fn layer(&self) -> LayerId;

    /// Start the local animation for `stage`, regenerating particles.
    fn activate(&mut self, stage: &Stage, rng: &mut StdRng);

    /// Stop animating and clear particles.
    fn deactivate(&mut self);

    /// Advance the local animation by one step. No-op while inactive.
    fn update(&mut self, rng: &mut StdRng);

    /// Whether the panel is currently active.
    fn is_active(&self) -> bool;

    /// Current particles.
    fn particles(&self) -> &[Particle];

    /// Panel-specific counter value shown in the overlay.
    fn counter(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Shared animation clock
// ---------------------------------------------------------------------------

/// Tick clock for a panel's local animation.
#[derive(Debug, Clone)]
struct Animation {
    duration: u32,
    elapsed: u32,
    active: bool,
    reported: bool,
}

impl Animation {
    const fn new(duration: u32) -> Self {
        Self {
            duration,
            elapsed: 0,
            active: false,
            reported: false,
        }
    }

    const fn start(&mut self) {
        self.elapsed = 0;
        self.active = true;
        self.reported = false;
    }

    const fn stop(&mut self) {
        self.active = false;
    }

    /// Step the clock, returning completed fraction, or `None` if inactive.
    fn step(&mut self) -> Option<f64> {
        if !self.active {
            return None;
        }
        self.elapsed = self.elapsed.saturating_add(1).min(self.duration);
        Some(self.fraction())
    }

    fn fraction(&self) -> f64 {
        if self.duration == 0 {
            return 1.0;
        }
        f64::from(self.elapsed) / f64::from(self.duration)
    }

    /// True once per activation, on the step the animation finishes.
    const fn take_completion(&mut self) -> bool {
        if self.active && !self.reported && self.elapsed >= self.duration {
            self.reported = true;
            return true;
        }
        false
    }

    /// `total` scaled by the completed fraction, rounded up.
    fn portion(&self, total: usize) -> usize {
        if self.duration == 0 {
            return total;
        }
        let total = u64::try_from(total).unwrap_or(u64::MAX);
        let scaled = total
            .saturating_mul(u64::from(self.elapsed))
            .div_ceil(u64::from(self.duration));
        usize::try_from(scaled).unwrap_or(usize::MAX)
    }
}

/// Number of items out of `total` selected by `ratio` (0 to 1).
fn ratio_count(total: usize, ratio: f64) -> usize {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let total_f = f64::from(u32::try_from(total).unwrap_or(u32::MAX));
    let value = (total_f * ratio).round().clamp(0.0, total_f);
    // Safe: clamped to 0..=total, which fits in usize.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let count = value as usize;
    count
}

fn report_if_done(animation: &mut Animation, bus: &SignalBus, layer: LayerId) {
    if animation.take_completion() {
        debug!(?layer, signal = %layer.signal(), "Panel animation complete");
        bus.report(layer.signal());
    }
}

// ---------------------------------------------------------------------------
// Database (sphere)
// ---------------------------------------------------------------------------

/// Rotating consumer sphere with an audience counter.
#[derive(Debug)]
pub struct DatabasePanel {
    bus: SignalBus,
    animation: Animation,
    set: ParticleSet,
    labels: Vec<String>,
    colors: Vec<String>,
    default_count: usize,
    default_target: u64,
    target: u64,
    count: u64,
}

impl DatabasePanel {
    /// Build from fixtures and panel timing.
    pub fn new(fixtures: &FixtureConfig, panels: &PanelConfig, bus: SignalBus) -> Self {
        Self {
            bus,
            animation: Animation::new(panels.database_ticks),
            set: ParticleSet::new(fixtures.max_particles_per_layer),
            labels: fixtures.audience_traits.clone(),
            colors: fixtures.colors.clone(),
            default_count: fixtures.audience_particle_count,
            default_target: fixtures.max_audience_count,
            target: fixtures.max_audience_count,
            count: 0,
        }
    }
}

impl Panel for DatabasePanel {
    fn layer(&self) -> LayerId {
        LayerId::Sphere
    }

    fn activate(&mut self, stage: &Stage, rng: &mut StdRng) {
        let (particles, target) = match stage.action {
            StageAction::ShowDatabase {
                particle_count,
                audience_target,
            } => (particle_count, audience_target),
            _ => (self.default_count, self.default_target),
        };
        let palette = Palette {
            labels: &self.labels,
            colors: &self.colors,
        };
        self.set
            .generate(particles, Layout::Sphere { radius: 1.0 }, palette, rng);
        self.target = target;
        self.count = 0;
        self.animation.start();
    }

    fn deactivate(&mut self) {
        self.animation.stop();
        self.set.clear();
        self.count = 0;
    }

    fn update(&mut self, _rng: &mut StdRng) {
        let Some(fraction) = self.animation.step() else {
            return;
        };
        self.set.rotate_y(ROTATION_STEP);
        // Ease out: the counter races early and settles on the target.
        let eased = 1.0 - (1.0 - fraction).powi(3);
        self.count = scale_u64(self.target, eased);
        self.set.reveal_labels(self.animation.portion(self.set.len()));
        report_if_done(&mut self.animation, &self.bus, LayerId::Sphere);
    }

    fn is_active(&self) -> bool {
        self.animation.active
    }

    fn particles(&self) -> &[Particle] {
        self.set.particles()
    }

    fn counter(&self) -> u64 {
        self.count
    }
}

fn scale_u64(value: u64, fraction: f64) -> u64 {
    if fraction >= 1.0 {
        return value;
    }
    // 2^20 steps is finer than any counter display.
    const STEPS: u32 = 1 << 20;
    let steps = f64::from(STEPS) * fraction.clamp(0.0, 1.0);
    // Safe: clamped to 0..=STEPS.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let steps = steps as u64;
    let scaled = u128::from(value)
        .saturating_mul(u128::from(steps))
        .checked_div(u128::from(STEPS))
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(value)
}

// ---------------------------------------------------------------------------
// Knowledge base (cube)
// ---------------------------------------------------------------------------

/// Document cube whose captions are revealed in stagger.
#[derive(Debug)]
pub struct KnowledgeBasePanel {
    bus: SignalBus,
    animation: Animation,
    set: ParticleSet,
    labels: Vec<String>,
    colors: Vec<String>,
    default_count: usize,
    revealed: usize,
}

impl KnowledgeBasePanel {
    /// Build from fixtures and panel timing.
    pub fn new(fixtures: &FixtureConfig, panels: &PanelConfig, bus: SignalBus) -> Self {
        Self {
            bus,
            animation: Animation::new(panels.knowledge_ticks),
            set: ParticleSet::new(fixtures.max_particles_per_layer),
            labels: fixtures.document_types.clone(),
            colors: fixtures.colors.clone(),
            default_count: fixtures.document_particle_count,
            revealed: 0,
        }
    }
}

impl Panel for KnowledgeBasePanel {
    fn layer(&self) -> LayerId {
        LayerId::Cube
    }

    fn activate(&mut self, stage: &Stage, rng: &mut StdRng) {
        let particles = match stage.action {
            StageAction::BuildKnowledgeBase { particle_count } => particle_count,
            _ => self.default_count,
        };
        let palette = Palette {
            labels: &self.labels,
            colors: &self.colors,
        };
        self.set
            .generate(particles, Layout::Cube { half_extent: 0.8 }, palette, rng);
        self.revealed = 0;
        self.animation.start();
    }

    fn deactivate(&mut self) {
        self.animation.stop();
        self.set.clear();
        self.revealed = 0;
    }

    fn update(&mut self, _rng: &mut StdRng) {
        if self.animation.step().is_none() {
            return;
        }
        self.set.rotate_y(ROTATION_STEP);
        self.revealed = self.animation.portion(self.set.len());
        self.set.reveal_labels(self.revealed);
        report_if_done(&mut self.animation, &self.bus, LayerId::Cube);
    }

    fn is_active(&self) -> bool {
        self.animation.active
    }

    fn particles(&self) -> &[Particle] {
        self.set.particles()
    }

    fn counter(&self) -> u64 {
        u64::try_from(self.revealed).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Client data fusion
// ---------------------------------------------------------------------------

/// Client data ring whose merging share contracts into the centre.
#[derive(Debug)]
pub struct DataFusionPanel {
    bus: SignalBus,
    animation: Animation,
    set: ParticleSet,
    labels: Vec<String>,
    colors: Vec<String>,
    default_count: usize,
    default_ratio: f64,
    merging: usize,
}

impl DataFusionPanel {
    /// Build from fixtures and panel timing.
    pub fn new(fixtures: &FixtureConfig, panels: &PanelConfig, bus: SignalBus) -> Self {
        Self {
            bus,
            animation: Animation::new(panels.fusion_ticks),
            set: ParticleSet::new(fixtures.max_particles_per_layer),
            labels: fixtures.client_data_types.clone(),
            colors: fixtures.colors.clone(),
            default_count: fixtures.client_particle_count,
            default_ratio: fixtures.merge_ratio,
            merging: 0,
        }
    }
}

impl Panel for DataFusionPanel {
    fn layer(&self) -> LayerId {
        LayerId::DataFusion
    }

    fn activate(&mut self, stage: &Stage, rng: &mut StdRng) {
        let (particles, ratio) = match stage.action {
            StageAction::FuseClientData {
                particle_count,
                merge_ratio,
            } => (particle_count, merge_ratio),
            _ => (self.default_count, self.default_ratio),
        };
        let palette = Palette {
            labels: &self.labels,
            colors: &self.colors,
        };
        self.set
            .generate(particles, Layout::Ring { radius: 1.2 }, palette, rng);
        self.merging = ratio_count(self.set.len(), ratio);
        self.set.reveal_labels(self.set.len());
        self.animation.start();
    }

    fn deactivate(&mut self) {
        self.animation.stop();
        self.set.clear();
        self.merging = 0;
    }

    fn update(&mut self, _rng: &mut StdRng) {
        let Some(fraction) = self.animation.step() else {
            return;
        };
        self.set.contract(self.merging, fraction);
        report_if_done(&mut self.animation, &self.bus, LayerId::DataFusion);
    }

    fn is_active(&self) -> bool {
        self.animation.active
    }

    fn particles(&self) -> &[Particle] {
        self.set.particles()
    }

    fn counter(&self) -> u64 {
        let merged = self
            .set
            .particles()
            .iter()
            .filter(|p| p.progress >= 1.0)
            .count();
        u64::try_from(merged).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Product matching
// ---------------------------------------------------------------------------

/// Audience sphere in which the matched share lights up.
#[derive(Debug)]
pub struct MatchingPanel {
    bus: SignalBus,
    animation: Animation,
    set: ParticleSet,
    labels: Vec<String>,
    colors: Vec<String>,
    default_count: usize,
    default_ratio: f64,
    matched: Vec<u32>,
    lit: usize,
}

impl MatchingPanel {
    /// Build from fixtures and panel timing.
    pub fn new(fixtures: &FixtureConfig, panels: &PanelConfig, bus: SignalBus) -> Self {
        Self {
            bus,
            animation: Animation::new(panels.matching_ticks),
            set: ParticleSet::new(fixtures.max_particles_per_layer),
            labels: fixtures.audience_traits.clone(),
            colors: fixtures.colors.clone(),
            default_count: fixtures.audience_particle_count,
            default_ratio: fixtures.match_ratio,
            matched: Vec::new(),
            lit: 0,
        }
    }
}

impl Panel for MatchingPanel {
    fn layer(&self) -> LayerId {
        LayerId::Matching
    }

    fn activate(&mut self, stage: &Stage, rng: &mut StdRng) {
        let (particles, ratio) = match stage.action {
            StageAction::MatchAudience {
                particle_count,
                match_ratio,
            } => (particle_count, match_ratio),
            _ => (self.default_count, self.default_ratio),
        };
        let palette = Palette {
            labels: &self.labels,
            colors: &self.colors,
        };
        self.set
            .generate(particles, Layout::Sphere { radius: 1.0 }, palette, rng);
        let len = self.set.len();
        let wanted = ratio_count(len, ratio);
        self.matched = index::sample(rng, len, wanted)
            .into_iter()
            .filter_map(|i| u32::try_from(i).ok())
            .collect();
        self.lit = 0;
        self.animation.start();
    }

    fn deactivate(&mut self) {
        self.animation.stop();
        self.set.clear();
        self.matched.clear();
        self.lit = 0;
    }

    fn update(&mut self, _rng: &mut StdRng) {
        if self.animation.step().is_none() {
            return;
        }
        self.set.rotate_y(ROTATION_STEP);
        self.lit = self.animation.portion(self.matched.len());
        self.set
            .highlight(self.matched.get(..self.lit).unwrap_or(&self.matched));
        report_if_done(&mut self.animation, &self.bus, LayerId::Matching);
    }

    fn is_active(&self) -> bool {
        self.animation.active
    }

    fn particles(&self) -> &[Particle] {
        self.set.particles()
    }

    fn counter(&self) -> u64 {
        u64::try_from(self.lit).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Analysis report
// ---------------------------------------------------------------------------

/// Report overlay whose sections are revealed one after another.
#[derive(Debug)]
pub struct ReportPanel {
    bus: SignalBus,
    animation: Animation,
    sections: u32,
    revealed: usize,
}

impl ReportPanel {
    /// Build from panel timing.
    pub const fn new(panels: &PanelConfig, bus: SignalBus) -> Self {
        Self {
            bus,
            animation: Animation::new(panels.report_ticks),
            sections: panels.report_sections,
            revealed: 0,
        }
    }
}

impl Panel for ReportPanel {
    fn layer(&self) -> LayerId {
        LayerId::Report
    }

    fn activate(&mut self, _stage: &Stage, _rng: &mut StdRng) {
        self.revealed = 0;
        self.animation.start();
    }

    fn deactivate(&mut self) {
        self.animation.stop();
        self.revealed = 0;
    }

    fn update(&mut self, _rng: &mut StdRng) {
        if self.animation.step().is_none() {
            return;
        }
        let sections = usize::try_from(self.sections).unwrap_or(usize::MAX);
        self.revealed = self.animation.portion(sections);
        report_if_done(&mut self.animation, &self.bus, LayerId::Report);
    }

    fn is_active(&self) -> bool {
        self.animation.active
    }

    fn particles(&self) -> &[Particle] {
        &[]
    }

    fn counter(&self) -> u64 {
        u64::try_from(self.revealed).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Panel set
// ---------------------------------------------------------------------------

/// All five panels, kept in sync with the current stage's visible layers.
pub struct PanelSet {
    panels: Vec<Box<dyn Panel>>,
}

impl std::fmt::Debug for PanelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelSet")
            .field("active", &self.active_layers())
            .finish()
    }
}

impl PanelSet {
    /// The standard panel for each layer, all reporting on `bus`.
    pub fn new(fixtures: &FixtureConfig, panels: &PanelConfig, bus: &SignalBus) -> Self {
        Self {
            panels: vec![
                Box::new(DatabasePanel::new(fixtures, panels, bus.clone())),
                Box::new(KnowledgeBasePanel::new(fixtures, panels, bus.clone())),
                Box::new(DataFusionPanel::new(fixtures, panels, bus.clone())),
                Box::new(MatchingPanel::new(fixtures, panels, bus.clone())),
                Box::new(ReportPanel::new(panels, bus.clone())),
            ],
        }
    }

    /// Activate panels that became visible and deactivate hidden ones.
    /// Panels that stay visible keep animating.
    pub fn sync(&mut self, stage: &Stage, rng: &mut StdRng) {
        for panel in &mut self.panels {
            let visible = stage.visible_layers.contains(&panel.layer());
            match (visible, panel.is_active()) {
                (true, false) => {
                    debug!(layer = ?panel.layer(), stage = %stage.id, "Activating panel");
                    panel.activate(stage, rng);
                }
                (false, true) => {
                    debug!(layer = ?panel.layer(), "Deactivating panel");
                    panel.deactivate();
                }
                _ => {}
            }
        }
    }

    /// Step every active panel.
    pub fn update(&mut self, rng: &mut StdRng) {
        for panel in &mut self.panels {
            panel.update(rng);
        }
    }

    /// Deactivate every panel and clear every particle set.
    pub fn deactivate_all(&mut self) {
        for panel in &mut self.panels {
            panel.deactivate();
        }
    }

    /// Layers whose panel is active.
    pub fn active_layers(&self) -> BTreeSet<LayerId> {
        self.panels
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.layer())
            .collect()
    }

    /// Particle count per layer.
    pub fn particle_counts(&self) -> BTreeMap<LayerId, usize> {
        self.panels
            .iter()
            .map(|p| (p.layer(), p.particles().len()))
            .collect()
    }

    /// Panel for `layer`.
    pub fn get(&self, layer: LayerId) -> Option<&dyn Panel> {
        self.panels
            .iter()
            .find(|p| p.layer() == layer)
            .map(|p| &**p)
    }

    /// Audience counter shown by the database panel.
    pub fn audience_count(&self) -> u64 {
        self.get(LayerId::Sphere).map_or(0, |p| p.counter())
    }
}
