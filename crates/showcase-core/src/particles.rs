//! Per-layer particle sets and the layouts they are generated in.
//!
//! Positions live in a unit scene centred on the origin. Panels move and
//! flag particles; they never grow a set past its configured maximum.

use std::f64::consts::TAU;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use showcase_types::Particle;

/// Fallback palette entry when no colors are configured.
const DEFAULT_COLOR: &str = "#ffbb00";

/// Shape a set is generated in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layout {
    /// Uniformly distributed over a sphere surface.
    Sphere {
        /// Sphere radius.
        radius: f64,
    },
    /// Scattered over the faces of an axis-aligned cube.
    Cube {
        /// Half the cube's edge length.
        half_extent: f64,
    },
    /// Spread around a flat ring in the XZ plane.
    Ring {
        /// Ring radius.
        radius: f64,
    },
}

/// Caption and color tables used while generating a set.
#[derive(Debug, Clone, Copy)]
pub struct Palette<'a> {
    /// Labels assigned round-robin by particle index.
    pub labels: &'a [String],
    /// Colors picked at random.
    pub colors: &'a [String],
}

/// An ordered, bounded collection of particles for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet {
    particles: Vec<Particle>,
    max: usize,
}

impl ParticleSet {
    /// An empty set holding at most `max` particles.
    pub const fn new(max: usize) -> Self {
        Self {
            particles: Vec::new(),
            max,
        }
    }

    /// Replace the contents with `count` fresh particles, capped at the
    /// set's maximum.
    pub fn generate(&mut self, count: usize, layout: Layout, palette: Palette<'_>, rng: &mut StdRng) {
        let count = count.min(self.max);
        self.particles.clear();
        self.particles.reserve(count);

        for (index, id) in (0..count).zip(0_u32..) {
            let (x, y, z) = position(layout, rng);
            let label = if palette.labels.is_empty() {
                None
            } else {
                palette
                    .labels
                    .get(index.checked_rem(palette.labels.len()).unwrap_or(0))
                    .cloned()
            };
            let color = palette
                .colors
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| DEFAULT_COLOR.to_owned());

            self.particles.push(Particle {
                id,
                x,
                y,
                z,
                size: rng.random_range(0.5..1.5),
                color,
                opacity: rng.random_range(0.6..1.0),
                label,
                label_visible: false,
                highlighted: false,
                progress: 0.0,
            });
        }
    }

    /// Remove every particle.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Current particles, in generation order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the set holds no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Configured maximum.
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Rotate every particle about the vertical axis.
    pub fn rotate_y(&mut self, angle: f64) {
        let (sin, cos) = angle.sin_cos();
        for p in &mut self.particles {
            let x = p.x.mul_add(cos, -(p.z * sin));
            let z = p.x.mul_add(sin, p.z * cos);
            p.x = x;
            p.z = z;
        }
    }

    /// Make the first `count` labels visible and hide the rest.
    pub fn reveal_labels(&mut self, count: usize) {
        for (index, p) in self.particles.iter_mut().enumerate() {
            p.label_visible = index < count;
        }
    }

    /// Pull the first `count` particles toward the origin so that their
    /// `progress` reaches `target` (0 to 1).
    pub fn contract(&mut self, count: usize, target: f64) {
        let target = target.clamp(0.0, 1.0);
        for p in self.particles.iter_mut().take(count) {
            if target <= p.progress {
                continue;
            }
            // Remaining distance scales with (1 - progress).
            let remaining = 1.0 - p.progress;
            let scale = if remaining > f64::EPSILON {
                (1.0 - target) / remaining
            } else {
                0.0
            };
            p.x *= scale;
            p.y *= scale;
            p.z *= scale;
            p.progress = target;
        }
    }

    /// Highlight the particles whose ids are in `ids` and label them.
    pub fn highlight(&mut self, ids: &[u32]) {
        for p in &mut self.particles {
            let on = ids.contains(&p.id);
            p.highlighted = on;
            p.label_visible = on;
        }
    }
}

fn position(layout: Layout, rng: &mut StdRng) -> (f64, f64, f64) {
    match layout {
        Layout::Sphere { radius } => {
            let theta = rng.random_range(0.0..TAU);
            let cos_phi: f64 = rng.random_range(-1.0..=1.0);
            let sin_phi = cos_phi.mul_add(-cos_phi, 1.0).max(0.0).sqrt();
            (
                radius * sin_phi * theta.cos(),
                radius * cos_phi,
                radius * sin_phi * theta.sin(),
            )
        }
        Layout::Cube { half_extent } => {
            let mut coords = [
                rng.random_range(-half_extent..=half_extent),
                rng.random_range(-half_extent..=half_extent),
                rng.random_range(-half_extent..=half_extent),
            ];
            // Pin one axis to a face.
            let face = if rng.random_bool(0.5) {
                half_extent
            } else {
                -half_extent
            };
            if let Some(axis) = coords.get_mut(rng.random_range(0..3_usize)) {
                *axis = face;
            }
            let [x, y, z] = coords;
            (x, y, z)
        }
        Layout::Ring { radius } => {
            let theta = rng.random_range(0.0..TAU);
            let r = radius * rng.random_range(0.85..=1.0);
            (r * theta.cos(), rng.random_range(-0.1..=0.1), r * theta.sin())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn palette_tables() -> (Vec<String>, Vec<String>) {
        (
            vec!["a".to_owned(), "b".to_owned()],
            vec!["#111111".to_owned()],
        )
    }

    fn distance(p: &Particle) -> f64 {
        (p.x * p.x + p.y * p.y + p.z * p.z).sqrt()
    }

    #[test]
    fn generate_caps_at_max() {
        let (labels, colors) = palette_tables();
        let mut set = ParticleSet::new(10);
        let mut rng = StdRng::seed_from_u64(1);
        set.generate(
            500,
            Layout::Sphere { radius: 1.0 },
            Palette { labels: &labels, colors: &colors },
            &mut rng,
        );
        assert_eq!(set.len(), 10);
        assert_eq!(set.max(), 10);
    }

    #[test]
    fn sphere_layout_stays_on_surface() {
        let (labels, colors) = palette_tables();
        let mut set = ParticleSet::new(50);
        let mut rng = StdRng::seed_from_u64(2);
        set.generate(
            50,
            Layout::Sphere { radius: 2.0 },
            Palette { labels: &labels, colors: &colors },
            &mut rng,
        );
        for p in set.particles() {
            assert!((distance(p) - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn labels_cycle_and_start_hidden() {
        let (labels, colors) = palette_tables();
        let mut set = ParticleSet::new(5);
        let mut rng = StdRng::seed_from_u64(3);
        set.generate(
            3,
            Layout::Cube { half_extent: 1.0 },
            Palette { labels: &labels, colors: &colors },
            &mut rng,
        );
        let got: Vec<_> = set.particles().iter().map(|p| p.label.clone()).collect();
        assert_eq!(
            got,
            vec![Some("a".to_owned()), Some("b".to_owned()), Some("a".to_owned())]
        );
        assert!(set.particles().iter().all(|p| !p.label_visible));
        assert!(set.particles().iter().all(|p| p.color == "#111111"));
    }

    #[test]
    fn same_seed_same_layout() {
        let (labels, colors) = palette_tables();
        let palette = Palette { labels: &labels, colors: &colors };
        let mut a = ParticleSet::new(20);
        let mut b = ParticleSet::new(20);
        a.generate(20, Layout::Ring { radius: 1.0 }, palette, &mut StdRng::seed_from_u64(9));
        b.generate(20, Layout::Ring { radius: 1.0 }, palette, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn rotation_preserves_distance() {
        let (labels, colors) = palette_tables();
        let mut set = ParticleSet::new(20);
        let mut rng = StdRng::seed_from_u64(4);
        set.generate(
            20,
            Layout::Sphere { radius: 1.0 },
            Palette { labels: &labels, colors: &colors },
            &mut rng,
        );
        let before: Vec<f64> = set.particles().iter().map(distance).collect();
        set.rotate_y(0.7);
        for (p, d) in set.particles().iter().zip(before) {
            assert!((distance(p) - d).abs() < 1e-9);
        }
    }

    #[test]
    fn contract_reaches_origin() {
        let (labels, colors) = palette_tables();
        let mut set = ParticleSet::new(4);
        let mut rng = StdRng::seed_from_u64(5);
        set.generate(
            4,
            Layout::Ring { radius: 1.0 },
            Palette { labels: &labels, colors: &colors },
            &mut rng,
        );
        set.contract(2, 0.5);
        set.contract(2, 1.0);
        for p in &set.particles()[..2] {
            assert!(distance(p) < 1e-9);
            assert!((p.progress - 1.0).abs() < f64::EPSILON);
        }
        for p in &set.particles()[2..] {
            assert!(distance(p) > 0.5);
        }
    }

    #[test]
    fn reveal_and_highlight() {
        let (labels, colors) = palette_tables();
        let mut set = ParticleSet::new(4);
        let mut rng = StdRng::seed_from_u64(6);
        set.generate(
            4,
            Layout::Sphere { radius: 1.0 },
            Palette { labels: &labels, colors: &colors },
            &mut rng,
        );
        set.reveal_labels(2);
        let visible = set.particles().iter().filter(|p| p.label_visible).count();
        assert_eq!(visible, 2);

        set.highlight(&[3]);
        let lit: Vec<u32> = set
            .particles()
            .iter()
            .filter(|p| p.highlighted)
            .map(|p| p.id)
            .collect();
        assert_eq!(lit, vec![3]);
    }

    #[test]
    fn clear_empties() {
        let (labels, colors) = palette_tables();
        let mut set = ParticleSet::new(4);
        set.generate(
            4,
            Layout::Sphere { radius: 1.0 },
            Palette { labels: &labels, colors: &colors },
            &mut StdRng::seed_from_u64(7),
        );
        set.clear();
        assert!(set.is_empty());
    }
}
