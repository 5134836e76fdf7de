//! Per-frame instance transform updates.
//!
//! Every morphing population lives on one entity carrying a
//! [`MorphPopulation`] (the immutable layout plus its [`MotionProfile`]) and
//! an [`InstanceBuffer`].  Each frame:
//!
//! 1. [`begin_frame`] snapshots time and eased progress into [`FrameTick`].
//! 2. [`update_populations`] recomputes the *whole* buffer of every
//!    population from that snapshot.
//! 3. [`commit_instances`] copies buffer slots onto the instance entities'
//!    `Transform`s, which is what the renderer consumes.
//!
//! Steps 2 and 3 are chained, so a population is never observed half
//! updated.  Populations do not depend on each other.

use bevy::math::{EulerRot, Quat, Vec3};
use bevy::prelude::{Component, Entity, Query, Res, ResMut, Resource, Time, Transform};
use rayon::prelude::*;

use crate::layout::{Element, Population};
use crate::morph::MorphState;

/// Snapshot of the values every update in one frame reads.
///
/// Built once per frame by [`begin_frame`] and passed by reference into the
/// pure update functions instead of each system re-reading shared state.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTick {
    /// Seconds since the previous frame.
    pub dt: f32,
    /// Seconds since startup.
    pub elapsed: f32,
    /// Eased morph progress in `[0, 1]`.
    pub eased: f32,
}

impl FrameTick {
    pub fn new(dt: f32, elapsed: f32, eased: f32) -> Self {
        Self { dt, elapsed, eased }
    }
}

/// Bevy system: refresh [`FrameTick`] after the morph has been integrated.
pub fn begin_frame(time: Res<Time>, morph: Res<MorphState>, mut tick: ResMut<FrameTick>) {
    *tick = FrameTick {
        dt: time.delta_secs(),
        elapsed: time.elapsed_secs(),
        eased: morph.eased(),
    };
}

// --- motion profiles ----------------------------------------------------------

/// Where the phase of the vertical float oscillation comes from.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FloatPhase {
    /// `random_phase · scale`.
    Random { scale: f32 },
    /// The compact position's x coordinate; neighbours bob together.
    CompactX,
}

/// Radial "breathing" pulse applied to the interpolated position.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Breathing {
    /// Angular frequency (rad/s).
    pub rate: f32,
    /// Multiplier on `random_phase` desynchronising elements.
    pub phase_scale: f32,
    /// Relative pulse amplitude (`0.03` = ±3 %).
    pub depth: f32,
}

/// How a population moves on top of the layout interpolation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MotionProfile {
    /// Peak vertical float at full dispersal.
    pub float_amplitude: f32,
    /// Angular frequency of the float.  `None` uses each element's `speed`.
    pub float_speed: Option<f32>,
    pub float_phase: FloatPhase,
    pub breathing: Option<Breathing>,
    /// Constant yaw spin (rad/s).
    pub yaw_rate: f32,
    /// Pitch spin (rad/s) at full dispersal; scaled by eased progress.
    pub pitch_rate: f32,
    /// Relative scale increase at full dispersal.
    pub scale_growth: f32,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::ornament()
    }
}

impl MotionProfile {
    /// Foliage particles: breathe, drift strongly, never spin.
    pub fn foliage() -> Self {
        Self {
            float_amplitude: 2.0,
            float_speed: Some(0.5),
            float_phase: FloatPhase::Random { scale: 5.0 },
            breathing: Some(Breathing {
                rate: 2.0,
                phase_scale: 10.0,
                depth: 0.03,
            }),
            yaw_rate: 0.0,
            pitch_rate: 0.0,
            scale_growth: 0.0,
        }
    }

    /// Scattered ornaments.
    pub fn ornament() -> Self {
        Self {
            float_amplitude: 0.5,
            float_speed: None,
            float_phase: FloatPhase::CompactX,
            breathing: None,
            yaw_rate: 0.1,
            pitch_rate: 0.05,
            scale_growth: 0.5,
        }
    }

    /// Pearls float less than the other ornaments.
    pub fn pearl() -> Self {
        Self {
            float_amplitude: 0.2,
            ..Self::ornament()
        }
    }
}

// --- pure transform math --------------------------------------------------------

/// Interpolate between two layout positions.
///
/// Written as `a·(1-t) + b·t` so both endpoints are reproduced exactly.
#[inline]
pub fn morph_lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a * (1.0 - t) + b * t
}

/// Transform of one element at the given frame.
pub fn element_transform(element: &Element, motion: &MotionProfile, tick: &FrameTick) -> Transform {
    let eased = tick.eased;
    let time = tick.elapsed;

    let mut position = morph_lerp(element.compact_position, element.dispersed_position, eased);

    if let Some(b) = motion.breathing {
        let pulse = 1.0 + (time * b.rate + element.random_phase * b.phase_scale).sin() * b.depth;
        position *= pulse;
    }

    let speed = motion.float_speed.unwrap_or(element.speed);
    let phase = match motion.float_phase {
        FloatPhase::Random { scale } => element.random_phase * scale,
        FloatPhase::CompactX => element.compact_position.x,
    };
    position.y += (time * speed + phase).sin() * motion.float_amplitude * eased;

    let offset = element.rotation_offset;
    let rotation = Quat::from_euler(
        EulerRot::XYZ,
        offset.x + time * motion.pitch_rate * eased,
        offset.y + time * motion.yaw_rate,
        offset.z,
    );

    let scale = element.base_scale * (1.0 + eased * motion.scale_growth);

    Transform {
        translation: position,
        rotation,
        scale: Vec3::splat(scale),
    }
}

// --- instance buffers -----------------------------------------------------------

/// One morphing population: immutable layout plus its motion profile.
#[derive(Component, Clone, Debug)]
pub struct MorphPopulation {
    pub population: Population,
    pub motion: MotionProfile,
}

/// Below this many elements a buffer is filled on the calling thread.
pub const PARALLEL_MIN_ELEMENTS: usize = 1024;

/// Per-population output buffer, one transform per element.
#[derive(Component, Clone, Debug, Default)]
pub struct InstanceBuffer {
    transforms: Vec<Transform>,
}

impl InstanceBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            transforms: Vec::with_capacity(capacity),
        }
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn get(&self, index: usize) -> Option<&Transform> {
        self.transforms.get(index)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Recompute every slot from `population` for this frame.
    ///
    /// Populations of at least [`PARALLEL_MIN_ELEMENTS`] are split across the
    /// rayon pool; slot order always matches element order.
    pub fn write_morph(&mut self, population: &Population, motion: &MotionProfile, tick: &FrameTick) {
        self.transforms.clear();
        let elements = population.elements();
        if elements.len() >= PARALLEL_MIN_ELEMENTS {
            self.transforms
                .par_extend(elements.par_iter().map(|e| element_transform(e, motion, tick)));
        } else {
            self.transforms
                .extend(elements.iter().map(|e| element_transform(e, motion, tick)));
        }
    }

    /// Replace the whole buffer.
    pub fn replace(&mut self, transforms: impl IntoIterator<Item = Transform>) {
        self.transforms.clear();
        self.transforms.extend(transforms);
    }
}

/// Marks a rendered instance as slot `index` of the buffer on `buffer`.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceOf {
    pub buffer: Entity,
    pub index: usize,
}

/// Bevy system: recompute every morphing population's buffer.
pub fn update_populations(
    tick: Res<FrameTick>,
    mut populations: Query<(&MorphPopulation, &mut InstanceBuffer)>,
) {
    for (pop, mut buffer) in &mut populations {
        buffer.write_morph(&pop.population, &pop.motion, &tick);
    }
}

/// Bevy system: copy buffer slots onto instance entities.
pub fn commit_instances(
    buffers: Query<&InstanceBuffer>,
    mut instances: Query<(&InstanceOf, &mut Transform)>,
) {
    for (slot, mut transform) in &mut instances {
        let Ok(buffer) = buffers.get(slot.buffer) else {
            continue;
        };
        if let Some(next) = buffer.get(slot.index) {
            *transform = *next;
        }
    }
}

// --- topper and tree root ----------------------------------------------------------

/// Motion of the star on top of the tree.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TopperConfig {
    /// Height in the compact form.
    pub base_y: f32,
    /// Extra height at full dispersal.
    pub rise: f32,
    /// Amplitude of the idle bob.
    pub bob: f32,
    /// Idle yaw spin (rad/s).
    pub spin: f32,
    /// Additional yaw spin at full dispersal (rad/s).
    pub spin_boost: f32,
    /// Roll wobble amplitude at full dispersal (radians).
    pub wobble: f32,
    pub scale_growth: f32,
}

impl Default for TopperConfig {
    fn default() -> Self {
        Self {
            base_y: 4.0,
            rise: 4.0,
            bob: 0.1,
            spin: 0.2,
            spin_boost: 0.5,
            wobble: 0.1,
            scale_growth: 0.5,
        }
    }
}

/// Transform of the topper at the given frame.
pub fn topper_transform(config: &TopperConfig, tick: &FrameTick) -> Transform {
    let eased = tick.eased;
    let time = tick.elapsed;
    let y = config.base_y + eased * config.rise + time.sin() * config.bob;
    let yaw = time * (config.spin + eased * config.spin_boost);
    let roll = time.sin() * config.wobble * eased;
    Transform {
        translation: Vec3::new(0.0, y, 0.0),
        rotation: Quat::from_euler(EulerRot::XYZ, 0.0, yaw, roll),
        scale: Vec3::splat(1.0 + eased * config.scale_growth),
    }
}

/// The star topper, a population of one.
#[derive(Component, Clone, Debug, Default)]
pub struct Topper {
    pub motion: TopperConfig,
}

/// Bevy system: animate the topper.
pub fn animate_topper(tick: Res<FrameTick>, mut toppers: Query<(&Topper, &mut Transform)>) {
    for (topper, mut transform) in &mut toppers {
        *transform = topper_transform(&topper.motion, &tick);
    }
}

/// Parent of every tree population; yaws slowly.
#[derive(Component, Clone, Copy, Debug)]
pub struct TreeRoot {
    /// Yaw rate (rad/s).
    pub spin_rate: f32,
}

/// Bevy system: yaw the tree root.
pub fn spin_tree_root(tick: Res<FrameTick>, mut roots: Query<(&TreeRoot, &mut Transform)>) {
    for (root, mut transform) in &mut roots {
        transform.rotation = Quat::from_rotation_y(tick.elapsed * root.spin_rate);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::foliage::{FoliageConfig, FoliageGenerator};
    use crate::layout::{LayoutGenerator, OrnamentKind, PopulationTag};
    use crate::ornaments::{OrnamentConfig, OrnamentGenerator};

    fn still() -> MotionProfile {
        MotionProfile {
            float_amplitude: 0.0,
            breathing: None,
            ..MotionProfile::ornament()
        }
    }

    fn element() -> Element {
        Element {
            compact_position: Vec3::new(0.3, -1.7, 1.1),
            dispersed_position: Vec3::new(-6.1, 2.9, 7.3),
            random_phase: 0.37,
            base_scale: 0.2,
            speed: 0.4,
            rotation_offset: Vec3::new(0.5, 1.0, 0.0),
            tag: PopulationTag::Ornament(OrnamentKind::Metal),
        }
    }

    #[test]
    fn lerp_reproduces_both_layouts_exactly() {
        let rng = &mut rand::rngs::StdRng::seed_from_u64(3);
        let pop = FoliageGenerator::new(FoliageConfig::default()).generate(500, rng);
        for e in pop.elements() {
            assert_eq!(morph_lerp(e.compact_position, e.dispersed_position, 0.0), e.compact_position);
            assert_eq!(
                morph_lerp(e.compact_position, e.dispersed_position, 1.0),
                e.dispersed_position
            );
        }
    }

    #[test]
    fn compact_form_is_still() {
        let e = element();
        let motion = MotionProfile::ornament();
        for time in [0.0, 1.3, 17.0] {
            let t = element_transform(&e, &motion, &FrameTick::new(0.016, time, 0.0));
            assert_eq!(t.translation, e.compact_position);
            assert_eq!(t.scale, Vec3::splat(e.base_scale));
        }
    }

    #[test]
    fn dispersed_form_reaches_the_dispersed_layout() {
        let e = element();
        let t = element_transform(&e, &still(), &FrameTick::new(0.016, 5.0, 1.0));
        assert_eq!(t.translation, e.dispersed_position);
        assert!((t.scale.x - e.base_scale * 1.5).abs() < 1e-6);
    }

    #[test]
    fn float_scales_with_eased_progress() {
        let e = element();
        let motion = MotionProfile::ornament();
        let time = 2.0;
        let wave = (time * e.speed + e.compact_position.x).sin();
        for eased in [0.25, 0.5, 1.0] {
            let t = element_transform(&e, &motion, &FrameTick::new(0.016, time, eased));
            let base = morph_lerp(e.compact_position, e.dispersed_position, eased);
            let expected = base.y + wave * 0.5 * eased;
            assert!((t.translation.y - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn yaw_spins_even_when_compact() {
        let e = Element {
            rotation_offset: Vec3::ZERO,
            ..element()
        };
        let motion = MotionProfile::ornament();
        let a = element_transform(&e, &motion, &FrameTick::new(0.0, 0.0, 0.0));
        let b = element_transform(&e, &motion, &FrameTick::new(0.0, 10.0, 0.0));
        assert!(a.rotation.angle_between(b.rotation) > 0.5);
        let (_, yaw, _) = b.rotation.to_euler(EulerRot::YXZ);
        assert!((yaw - 1.0).abs() < 1e-4);
    }

    #[test]
    fn breathing_pulses_foliage_radially() {
        let e = Element {
            random_phase: 0.0,
            ..element()
        };
        let motion = MotionProfile {
            float_amplitude: 0.0,
            ..MotionProfile::foliage()
        };
        // sin(2·t) = 1 at t = π/4.
        let t = element_transform(&e, &motion, &FrameTick::new(0.0, std::f32::consts::FRAC_PI_4, 0.0));
        let expected = e.compact_position * 1.03;
        assert!((t.translation - expected).length() < 1e-5);
    }

    #[test]
    fn write_morph_fills_one_slot_per_element() {
        let rng = &mut rand::rngs::StdRng::seed_from_u64(9);
        let pop = OrnamentGenerator::new(OrnamentConfig::default()).generate_pearls(200, rng);
        let mut buffer = InstanceBuffer::default();
        buffer.write_morph(&pop, &MotionProfile::pearl(), &FrameTick::new(0.016, 1.0, 0.5));
        assert_eq!(buffer.len(), 200);
        buffer.write_morph(&Population::default(), &MotionProfile::pearl(), &FrameTick::default());
        assert!(buffer.is_empty());
    }

    #[test]
    fn parallel_fill_matches_element_order() {
        let rng = &mut rand::rngs::StdRng::seed_from_u64(11);
        let pop = FoliageGenerator::new(FoliageConfig::default()).generate(PARALLEL_MIN_ELEMENTS * 3, rng);
        let motion = MotionProfile::foliage();
        let tick = FrameTick::new(0.016, 2.5, 0.7);
        let mut buffer = InstanceBuffer::default();
        buffer.write_morph(&pop, &motion, &tick);
        assert_eq!(buffer.len(), pop.len());
        for (slot, e) in buffer.transforms().iter().zip(pop.elements()) {
            assert_eq!(*slot, element_transform(e, &motion, &tick));
        }
    }

    #[test]
    fn topper_rises_and_grows_when_dispersed() {
        let config = TopperConfig::default();
        let compact = topper_transform(&config, &FrameTick::new(0.0, 0.0, 0.0));
        let dream = topper_transform(&config, &FrameTick::new(0.0, 0.0, 1.0));
        assert_eq!(compact.translation.y, 4.0);
        assert_eq!(dream.translation.y, 8.0);
        assert_eq!(compact.scale, Vec3::ONE);
        assert_eq!(dream.scale, Vec3::splat(1.5));
    }
}
