//! Camera aim damping and the orbit camera.
//!
//! [`CameraAim`] is the point the camera looks at, in the vertical plane
//! through the tree.  While a hand is tracked it chases the control vector
//! quickly; otherwise it drifts back to the centre slowly.  Damping uses
//! [`StableInterpolate::smooth_nudge`], so the motion is independent of the
//! frame rate and never overshoots.

use std::f32::consts::TAU;

use bevy::math::{StableInterpolate, Vec2, Vec3};
use bevy::prelude::{Component, Query, Res, ResMut, Resource, Transform};

use crate::gesture::ControlVector;
use crate::transform::FrameTick;

/// Tunables for the aim controller.
#[derive(Resource, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraAimConfig {
    /// World units the aim moves for a control value of `±1` on x.
    pub horizontal_range: f32,
    pub vertical_range: f32,
    /// Decay rate (1/s) while a hand is tracked.
    pub active_decay: f32,
    /// Decay rate (1/s) when returning to centre.
    pub idle_decay: f32,
}

impl Default for CameraAimConfig {
    fn default() -> Self {
        Self {
            horizontal_range: 5.0,
            vertical_range: 3.0,
            active_decay: 12.0,
            idle_decay: 2.0,
        }
    }
}

/// Current look target.  Only [`aim_camera`] writes it.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraAim {
    pub target: Vec2,
}

impl CameraAim {
    /// Where the aim is heading for this control state.
    pub fn goal(control: &ControlVector, config: &CameraAimConfig) -> Vec2 {
        if control.active {
            Vec2::new(
                control.x * config.horizontal_range,
                control.y * config.vertical_range,
            )
        } else {
            Vec2::ZERO
        }
    }

    /// Damp toward the goal over `dt` seconds.
    pub fn step(&mut self, control: &ControlVector, config: &CameraAimConfig, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let goal = Self::goal(control, config);
        let decay = if control.active {
            config.active_decay
        } else {
            config.idle_decay
        };
        self.target.smooth_nudge(&goal, decay, dt);
    }

    /// The aim as a world-space point on the `z = 0` plane.
    pub fn look_at(&self) -> Vec3 {
        self.target.extend(0.0)
    }
}

/// Bevy system: damp the camera aim toward the control vector.
pub fn aim_camera(
    tick: Res<FrameTick>,
    config: Res<CameraAimConfig>,
    control: Res<ControlVector>,
    mut aim: ResMut<CameraAim>,
) {
    aim.step(&control, &config, tick.dt);
}

/// Camera that circles the tree centre and turns toward the aim point.
#[derive(Component, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OrbitCamera {
    /// Horizontal distance from the tree centre.
    pub distance: f32,
    /// Height above the tree centre.
    pub height: f32,
    /// Auto-rotation (rad/s).
    pub auto_rotate: f32,
    /// Current azimuth (radians); `0` looks down `-z`.
    pub azimuth: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            distance: 15.0,
            height: 3.0,
            auto_rotate: 0.3 * TAU / 60.0,
            azimuth: 0.0,
        }
    }
}

impl OrbitCamera {
    /// Position on the orbit at the current azimuth.  Independent of the aim.
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.distance * self.azimuth.sin(),
            self.height,
            self.distance * self.azimuth.cos(),
        )
    }

    /// Camera transform on the orbit, turned to face `aim`.
    pub fn transform(&self, aim: Vec3) -> Transform {
        Transform::from_translation(self.position()).looking_at(aim, Vec3::Y)
    }
}

/// Bevy system: advance the orbit and point every orbit camera at the aim.
pub fn orbit_camera(tick: Res<FrameTick>, aim: Res<CameraAim>, mut cameras: Query<(&mut OrbitCamera, &mut Transform)>) {
    for (mut orbit, mut transform) in &mut cameras {
        orbit.azimuth = (orbit.azimuth + orbit.auto_rotate * tick.dt).rem_euclid(TAU);
        *transform = orbit.transform(aim.look_at());
    }
}
