//! Ambient "fairy dust": motes that drift down through the scene and wrap
//! back to the top.  Independent of the morph.

use bevy::math::{Quat, Vec3};
use bevy::prelude::{Component, Query, Res, Transform};
use rand::Rng;

use crate::transform::{FrameTick, InstanceBuffer};

/// Configures the dust cloud.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DustConfig {
    pub count: usize,
    /// Edge length of the spawn cube.
    pub extent: f32,
    /// Height of the spawn cube's centre.
    pub center_y: f32,
    /// Fall speed range `[min, max)` in units per reference frame.
    pub fall_range: [f32; 2],
    /// Frame rate the fall and wiggle amounts are expressed in.
    pub reference_fps: f32,
    /// Angular frequency of the sideways wiggle.
    pub wiggle_rate: f32,
    /// Sideways step per reference frame at the wiggle peak.
    pub wiggle_step: f32,
    /// Motes below this height wrap to `ceiling`.
    pub floor: f32,
    pub ceiling: f32,
    /// Cloud yaw (rad/s).
    pub spin: f32,
    /// Mote radius.
    pub size: f32,
}

impl Default for DustConfig {
    fn default() -> Self {
        Self {
            count: 1500,
            extent: 20.0,
            center_y: 5.0,
            fall_range: [0.002, 0.012],
            reference_fps: 60.0,
            wiggle_rate: 0.3,
            wiggle_step: 0.01,
            floor: -5.0,
            ceiling: 15.0,
            spin: 0.01,
            size: 0.06,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mote {
    pub position: Vec3,
    /// Fall per reference frame.
    pub fall: f32,
    /// Wiggle phase offset.
    pub offset: f32,
}

/// Dust cloud state.  Mote positions are mutable, unlike layout elements.
#[derive(Component, Clone, Debug)]
pub struct DustCloud {
    pub config: DustConfig,
    motes: Vec<Mote>,
}

impl DustCloud {
    pub fn new<R: Rng + ?Sized>(config: DustConfig, rng: &mut R) -> Self {
        let [fall_min, fall_max] = config.fall_range;
        let motes = (0..config.count)
            .map(|_| Mote {
                position: Vec3::new(
                    (rng.random::<f32>() - 0.5) * config.extent,
                    (rng.random::<f32>() - 0.5) * config.extent + config.center_y,
                    (rng.random::<f32>() - 0.5) * config.extent,
                ),
                fall: fall_min + rng.random::<f32>() * (fall_max - fall_min),
                offset: rng.random::<f32>() * 100.0,
            })
            .collect();
        Self { config, motes }
    }

    pub fn motes(&self) -> &[Mote] {
        &self.motes
    }

    /// Move every mote by one tick.
    pub fn advance(&mut self, tick: &FrameTick) {
        let c = &self.config;
        let frames = tick.dt.max(0.0) * c.reference_fps;
        let wiggle_base = tick.elapsed * c.wiggle_rate;
        for mote in &mut self.motes {
            mote.position.y -= mote.fall * frames;
            mote.position.x += (wiggle_base + mote.offset).sin() * c.wiggle_step * frames;
            if mote.position.y < c.floor {
                mote.position.y = c.ceiling;
            }
        }
    }

    /// Write one transform per mote.
    pub fn write_instances(&self, buffer: &mut InstanceBuffer) {
        let scale = Vec3::splat(self.config.size);
        buffer.replace(self.motes.iter().map(|m| Transform {
            translation: m.position,
            rotation: Quat::IDENTITY,
            scale,
        }));
    }

    /// Cloud yaw at `elapsed` seconds.
    pub fn rotation(&self, elapsed: f32) -> Quat {
        Quat::from_rotation_y(elapsed * self.config.spin)
    }
}

/// Bevy system: drift the dust and yaw the cloud.
pub fn drift_dust(
    tick: Res<FrameTick>,
    mut clouds: Query<(&mut DustCloud, &mut InstanceBuffer, &mut Transform)>,
) {
    for (mut cloud, mut buffer, mut transform) in &mut clouds {
        cloud.advance(&tick);
        cloud.write_instances(&mut buffer);
        transform.rotation = cloud.rotation(tick.elapsed);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn cloud() -> DustCloud {
        DustCloud::new(DustConfig::default(), &mut rand::rngs::StdRng::seed_from_u64(11))
    }

    #[test]
    fn spawns_inside_the_box() {
        let cloud = cloud();
        assert_eq!(cloud.motes().len(), 1500);
        for m in cloud.motes() {
            assert!(m.position.x.abs() <= 10.0 && m.position.z.abs() <= 10.0);
            assert!((-5.0..=15.0).contains(&m.position.y));
            assert!((0.002..0.012).contains(&m.fall));
        }
    }

    #[test]
    fn falls_proportionally_to_elapsed_time() {
        let mut cloud = cloud();
        let before: Vec<f32> = cloud.motes().iter().map(|m| m.position.y).collect();
        // Two reference frames.
        cloud.advance(&FrameTick::new(2.0 / 60.0, 1.0, 0.0));
        for (m, y0) in cloud.motes().iter().zip(before) {
            if m.position.y != 15.0 {
                assert!((y0 - m.position.y - 2.0 * m.fall).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn wraps_below_the_floor() {
        let mut cloud = DustCloud::new(
            DustConfig {
                count: 1,
                ..DustConfig::default()
            },
            &mut rand::rngs::StdRng::seed_from_u64(1),
        );
        cloud.motes[0].position.y = -4.999;
        cloud.advance(&FrameTick::new(1.0, 0.0, 0.0));
        assert_eq!(cloud.motes()[0].position.y, 15.0);
    }

    #[test]
    fn writes_one_instance_per_mote() {
        let cloud = cloud();
        let mut buffer = InstanceBuffer::default();
        cloud.write_instances(&mut buffer);
        assert_eq!(buffer.len(), cloud.motes().len());
        assert_eq!(buffer.transforms()[0].translation, cloud.motes()[0].position);
    }
}
