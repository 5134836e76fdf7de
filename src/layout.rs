//! Core trait and data types shared by all layout generators.
//!
//! A [`Population`] is a fixed set of [`Element`]s generated once when the
//! scene is built.  Each element carries two target positions, one per
//! layout, and never has them rewritten afterwards; only the per-frame
//! transforms derived from them change.

use std::f32::consts::TAU;

use bevy::math::Vec3;
use rand::Rng;

/// Ornament sub-types.  Each kind is rendered as its own instanced population.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OrnamentKind {
    /// Faceted transmissive sphere.
    Crystal,
    /// Hammered rose-gold bauble.
    Metal,
    /// Velvet gift box.
    GiftBox,
    /// Star pendant.
    Star,
    /// Necklace pearl; placed on a deterministic helix, not scattered.
    Pearl,
}

/// What a population element represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PopulationTag {
    Foliage,
    Ornament(OrnamentKind),
}

/// One visual element with its two layout targets.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub compact_position: Vec3,
    pub dispersed_position: Vec3,
    /// Uniform in `[0, 1)`; seeds time-based secondary motion.
    pub random_phase: f32,
    pub base_scale: f32,
    pub speed: f32,
    /// Fixed XYZ Euler angles (radians) added under the animated spin.
    pub rotation_offset: Vec3,
    pub tag: PopulationTag,
}

/// A fixed-size set of elements generated once at scene construction.
#[derive(Clone, Debug, Default)]
pub struct Population {
    elements: Vec<Element>,
}

impl Population {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Split into one population per tag, preserving element order.
    ///
    /// Tags that never occur are omitted.
    pub fn partition_by_tag(self) -> Vec<(PopulationTag, Population)> {
        let mut groups: Vec<(PopulationTag, Vec<Element>)> = Vec::new();
        for element in self.elements {
            match groups.iter_mut().find(|(tag, _)| *tag == element.tag) {
                Some((_, group)) => group.push(element),
                None => groups.push((element.tag, vec![element])),
            }
        }
        groups
            .into_iter()
            .map(|(tag, elements)| (tag, Population::new(elements)))
            .collect()
    }
}

/// Trait for procedural layout configuration structs.
///
/// Implementations must draw every random quantity for an element from
/// `rng` so the same seeded generator reproduces the same population.
pub trait LayoutGenerator {
    /// Produce exactly `count` elements.  `count == 0` yields an empty
    /// population.
    fn generate<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Population;
}

/// Upright cone used by the compact layout.  The radius shrinks linearly
/// from `base_radius` at `base_y` to zero at `base_y + height`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConeShape {
    /// Height of the cone's base plane.
    pub base_y: f32,
    /// Distance from the base to the apex.
    pub height: f32,
    /// Radius at the base plane.
    pub base_radius: f32,
}

impl Default for ConeShape {
    fn default() -> Self {
        Self {
            base_y: -2.0,
            height: 6.0,
            base_radius: 2.5,
        }
    }
}

impl ConeShape {
    /// Apex height.
    #[inline]
    pub fn apex_y(&self) -> f32 {
        self.base_y + self.height
    }

    /// Fraction of the base radius remaining at height `y`, clamped to `[0, 1]`.
    #[inline]
    pub fn taper(&self, y: f32) -> f32 {
        if self.height <= 0.0 {
            return 0.0;
        }
        (1.0 - (y - self.base_y) / self.height).clamp(0.0, 1.0)
    }

    /// Cone radius at height `y`.
    #[inline]
    pub fn radius_at(&self, y: f32) -> f32 {
        self.taper(y) * self.base_radius
    }

    /// `true` if `p` lies inside the cone grown outward by `margin`.
    pub fn contains(&self, p: Vec3, margin: f32) -> bool {
        if p.y < self.base_y - margin || p.y > self.apex_y() + margin {
            return false;
        }
        let horizontal = (p.x * p.x + p.z * p.z).sqrt();
        horizontal <= self.radius_at(p.y) + margin
    }
}

/// Point on the horizontal circle of `radius` at `angle`, lifted to `y`.
#[inline]
pub(crate) fn on_circle(angle: f32, radius: f32, y: f32) -> Vec3 {
    Vec3::new(angle.cos() * radius, y, angle.sin() * radius)
}

/// Uniform angle in `[0, 2π)`.
#[inline]
pub(crate) fn random_angle<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.random::<f32>() * TAU
}

/// Uniform sample in `(-half, half)`.
#[inline]
pub(crate) fn jitter<R: Rng + ?Sized>(rng: &mut R, half: f32) -> f32 {
    (rng.random::<f32>() - 0.5) * 2.0 * half
}
