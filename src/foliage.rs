//! Foliage particle layout.
//!
//! The algorithm, per particle:
//!  1. Draw a height uniformly over the cone and an angle uniformly around it.
//!  2. Place the compact position at `radius_at(y) · sqrt(u)` so particles
//!     are spread uniformly by area across each horizontal slice instead of
//!     clustering at the trunk.
//!  3. Derive the dispersed position from the *same* angle and height: the
//!     angle is twisted proportionally to height and the radius expanded, so
//!     every particle travels along its own coherent spiral arm.

use bevy::math::Vec3;
use rand::Rng;

use crate::layout::{
    ConeShape, Element, LayoutGenerator, Population, PopulationTag, jitter, on_circle,
    random_angle,
};

/// Configures a [`FoliageGenerator`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FoliageConfig {
    /// Number of particles.
    pub count: usize,
    pub cone: ConeShape,
    /// Radians of spiral twist per unit of height in the dispersed layout.
    pub twist_per_unit: f32,
    /// Multiplier applied to the compact radius in the dispersed layout.
    pub spread_scale: f32,
    /// Constant added to the dispersed radius, opening a hollow core.
    pub spread_offset: f32,
    /// Vertical stretch of the dispersed layout.
    pub height_stretch: f32,
    /// Half-range of the random vertical jitter in the dispersed layout.
    pub height_jitter: f32,
    /// Particle size range `[min, max)`.
    pub size_range: [f32; 2],
}

impl Default for FoliageConfig {
    fn default() -> Self {
        Self {
            count: 4000,
            cone: ConeShape::default(),
            twist_per_unit: 2.0,
            spread_scale: 3.0,
            spread_offset: 2.0,
            height_stretch: 1.5,
            height_jitter: 2.0,
            size_range: [0.5, 1.0],
        }
    }
}

/// Procedural foliage layout generator.
pub struct FoliageGenerator {
    config: FoliageConfig,
}

impl FoliageGenerator {
    /// Create a new generator with the given configuration.
    pub fn new(config: FoliageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FoliageConfig {
        &self.config
    }
}

impl LayoutGenerator for FoliageGenerator {
    fn generate<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Population {
        let c = &self.config;
        let [size_min, size_max] = c.size_range;

        let elements = (0..count)
            .map(|_| {
                let y = c.cone.base_y + rng.random::<f32>() * c.cone.height;
                let radius = c.cone.radius_at(y) * rng.random::<f32>().sqrt();
                let angle = random_angle(rng);

                let compact_position = on_circle(angle, radius, y);

                let spiral_angle = angle + y * c.twist_per_unit;
                let spiral_radius = radius * c.spread_scale + c.spread_offset;
                let spiral_y = y * c.height_stretch + jitter(rng, c.height_jitter);
                let dispersed_position = on_circle(spiral_angle, spiral_radius, spiral_y);

                let random_phase = rng.random::<f32>();
                let base_scale = size_min + rng.random::<f32>() * (size_max - size_min);

                Element {
                    compact_position,
                    dispersed_position,
                    random_phase,
                    base_scale,
                    speed: 1.0,
                    rotation_offset: Vec3::ZERO,
                    tag: PopulationTag::Foliage,
                }
            })
            .collect();

        Population::new(elements)
    }
}
