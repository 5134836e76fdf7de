//! Ornament layouts: scattered baubles plus a pearl necklace.
//!
//! # Scattered ornaments
//! Each ornament picks its [`OrnamentKind`] by walking the cumulative
//! thresholds of an [`OrnamentMix`] with one uniform draw, then sits on the
//! cone *surface* (not inside it) at a random height and angle.  The
//! dispersed position mirrors the angle to the opposite side of the tree and
//! pushes the ornament far out.
//!
//! # Pearls
//! Pearls ignore the random scatter.  Pearl `i` of `N` uses `t = i / N` to
//! climb a fixed number of helix turns from the bottom of the tree to the
//! top, giving a continuous necklace.  In the dispersed layout the pearls
//! fan out into a flat ring.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use bevy::math::Vec3;
use rand::Rng;

use crate::layout::{
    ConeShape, Element, LayoutGenerator, OrnamentKind, Population, PopulationTag, jitter,
    on_circle, random_angle,
};

/// Relative frequencies of the four scattered ornament kinds.
///
/// The weights are normalised before use, so they need not sum to one.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OrnamentMix {
    pub metal: f32,
    pub star: f32,
    pub crystal: f32,
    pub gift_box: f32,
}

impl Default for OrnamentMix {
    fn default() -> Self {
        Self {
            metal: 0.60,
            star: 0.10,
            crystal: 0.15,
            gift_box: 0.15,
        }
    }
}

impl OrnamentMix {
    /// Map a uniform draw in `[0, 1)` to a kind.
    ///
    /// Buckets are laid out as metal, star, crystal, gift box.  Degenerate
    /// mixes (all weights zero or negative) always yield [`OrnamentKind::Metal`].
    pub fn pick(&self, u: f32) -> OrnamentKind {
        let weights = [
            (OrnamentKind::Metal, self.metal.max(0.0)),
            (OrnamentKind::Star, self.star.max(0.0)),
            (OrnamentKind::Crystal, self.crystal.max(0.0)),
            (OrnamentKind::GiftBox, self.gift_box.max(0.0)),
        ];
        let total: f32 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return OrnamentKind::Metal;
        }
        let target = u.clamp(0.0, 1.0) * total;
        let mut acc = 0.0;
        for (kind, w) in weights {
            acc += w;
            if target < acc {
                return kind;
            }
        }
        // Only reached when `u` rounds to the very top of the range.
        weights
            .iter()
            .rev()
            .find(|(_, w)| *w > 0.0)
            .map_or(OrnamentKind::Metal, |(kind, _)| *kind)
    }
}

/// Configures the scattered part of an [`OrnamentGenerator`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OrnamentConfig {
    /// Number of scattered ornaments.
    pub count: usize,
    pub cone: ConeShape,
    /// Portion of the cone height ornaments may hang on, measured from the base.
    pub height_span: f32,
    /// Outward offset from the cone surface so ornaments sit on the foliage.
    pub surface_offset: f32,
    pub mix: OrnamentMix,
    /// Multiplier applied to the compact radius in the dispersed layout.
    pub spread_scale: f32,
    pub spread_offset: f32,
    pub height_stretch: f32,
    pub height_jitter: f32,
    /// Scale range `[min, max)`.
    pub scale_range: [f32; 2],
    /// Float speed range `[min, max)`.
    pub speed_range: [f32; 2],
    pub pearls: PearlConfig,
}

impl Default for OrnamentConfig {
    fn default() -> Self {
        Self {
            count: 150,
            cone: ConeShape::default(),
            height_span: 5.5,
            surface_offset: 0.1,
            mix: OrnamentMix::default(),
            spread_scale: 5.0,
            spread_offset: 3.0,
            height_stretch: 1.5,
            height_jitter: 2.5,
            scale_range: [0.1, 0.25],
            speed_range: [0.2, 0.7],
            pearls: PearlConfig::default(),
        }
    }
}

/// Configures the pearl necklace helix.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PearlConfig {
    pub count: usize,
    /// Height of the first pearl.
    pub start_y: f32,
    /// Vertical distance covered from the first pearl to the last.
    pub rise: f32,
    /// Full helix turns from bottom to top.
    pub turns: f32,
    /// Radius multiplier applied to the cone radius (slightly outside the foliage).
    pub radius: f32,
    /// Mean radius of the dispersed ring.
    pub ring_radius: f32,
    /// Half-range of the random ring radius jitter.
    pub ring_jitter: f32,
    /// Half-thickness of the dispersed ring.
    pub ring_thickness: f32,
    pub scale: f32,
    pub speed: f32,
}

impl Default for PearlConfig {
    fn default() -> Self {
        Self {
            count: 200,
            start_y: -1.8,
            rise: 5.5,
            turns: 5.0,
            radius: 2.6,
            ring_radius: 8.0,
            ring_jitter: 1.0,
            ring_thickness: 1.0,
            scale: 0.08,
            speed: 0.1,
        }
    }
}

/// Procedural ornament layout generator.
///
/// `generate(count, ..)` produces `count` scattered ornaments;
/// [`generate_pearls`](Self::generate_pearls) produces the necklace and
/// [`generate_all`](Self::generate_all) both, using the configured counts.
pub struct OrnamentGenerator {
    config: OrnamentConfig,
}

impl OrnamentGenerator {
    /// Create a new generator with the given configuration.
    pub fn new(config: OrnamentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrnamentConfig {
        &self.config
    }

    /// Pearl necklace with `count` pearls.
    ///
    /// Compact positions are fully determined by the index; only the
    /// dispersed ring draws from `rng`.
    pub fn generate_pearls<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Population {
        let c = &self.config;
        let p = &c.pearls;
        let ratio = if c.cone.base_radius > 0.0 {
            p.radius / c.cone.base_radius
        } else {
            0.0
        };

        let elements = (0..count)
            .map(|i| {
                let t = i as f32 / count as f32;
                let y = p.start_y + t * p.rise;
                let angle = t * p.turns * TAU;
                let radius = c.cone.radius_at(y) * ratio;
                let compact_position = on_circle(angle, radius, y);

                let ring_angle = angle + FRAC_PI_2;
                let ring_radius = p.ring_radius + jitter(rng, p.ring_jitter);
                let ring_y = jitter(rng, p.ring_thickness);
                let dispersed_position = on_circle(ring_angle, ring_radius, ring_y);

                Element {
                    compact_position,
                    dispersed_position,
                    random_phase: t,
                    base_scale: p.scale,
                    speed: p.speed,
                    rotation_offset: Vec3::ZERO,
                    tag: PopulationTag::Ornament(OrnamentKind::Pearl),
                }
            })
            .collect();

        Population::new(elements)
    }

    /// Scattered ornaments followed by pearls, using the configured counts.
    pub fn generate_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Population {
        let scattered = self.generate(self.config.count, rng);
        let pearls = self.generate_pearls(self.config.pearls.count, rng);
        let mut elements = scattered.elements().to_vec();
        elements.extend_from_slice(pearls.elements());
        Population::new(elements)
    }
}

impl LayoutGenerator for OrnamentGenerator {
    fn generate<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Population {
        let c = &self.config;
        let [scale_min, scale_max] = c.scale_range;
        let [speed_min, speed_max] = c.speed_range;

        let elements = (0..count)
            .map(|_| {
                let kind = c.mix.pick(rng.random::<f32>());

                let y = c.cone.base_y + rng.random::<f32>() * c.height_span;
                let r = c.cone.radius_at(y);
                let theta = random_angle(rng);
                let compact_position = on_circle(theta, r + c.surface_offset, y);

                let d_radius = r * c.spread_scale + c.spread_offset;
                let d_y = y * c.height_stretch + jitter(rng, c.height_jitter);
                let dispersed_position = on_circle(theta + PI, d_radius, d_y);

                let rotation_offset =
                    Vec3::new(rng.random::<f32>() * PI, rng.random::<f32>() * PI, 0.0);
                let base_scale = scale_min + rng.random::<f32>() * (scale_max - scale_min);
                let speed = speed_min + rng.random::<f32>() * (speed_max - speed_min);

                Element {
                    compact_position,
                    dispersed_position,
                    random_phase: rng.random::<f32>(),
                    base_scale,
                    speed,
                    rotation_offset,
                    tag: PopulationTag::Ornament(kind),
                }
            })
            .collect();

        Population::new(elements)
    }
}
