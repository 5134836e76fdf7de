//! `bevy_dream_tree` — a gesture-driven morphing particle tree for Bevy.
//!
//! # Architecture
//! A few thousand elements are laid out twice by a [`LayoutGenerator`]: once
//! as a closed cone ("Emerald" form) and once as a scattered spiral ("Dream"
//! form).  A single [`MorphState`] blends between the two; every frame the
//! instance updaters write each population's [`InstanceBuffer`] from the
//! eased progress, and [`commit_instances`](transform::commit_instances)
//! copies the buffers onto the rendered entities.
//!
//! Hand gestures from an optional background [`GestureSensor`] (or the
//! keyboard and mouse) are turned into morph-target requests and a smoothed
//! [`ControlVector`] that steers the [`CameraAim`].
//!
//! Systems run in [`DreamTreeSet`] order:
//! `Input → Morph → Instances → Commit → Camera`.
//!
//! # Usage
//! ```rust,ignore
//! App::new()
//!     .add_plugins(DefaultPlugins)
//!     .add_plugins(DreamTreePlugin::default())
//!     .run();
//! ```

pub mod camera;
pub mod dust;
pub mod foliage;
pub mod gesture;
pub mod layout;
pub mod morph;
pub mod ornaments;
#[cfg(feature = "egui")]
pub mod overlay;
pub mod scene;
pub mod sensor;
pub mod sim;
pub mod transform;

pub use camera::{CameraAim, CameraAimConfig, OrbitCamera};
pub use gesture::{Classification, ControlVector, GestureConfig, GestureProcessor};
pub use layout::{Element, LayoutGenerator, Population, PopulationTag};
pub use morph::{MorphConfig, MorphState, MorphTarget};
pub use scene::TreeConfig;
pub use sensor::{GestureSensor, SensorBackend, SensorError, SensorStatus};
pub use transform::{FrameTick, InstanceBuffer};

use bevy::prelude::*;

/// Per-frame ordering of the plugin's systems.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DreamTreeSet {
    /// Sensor results and simulated input.
    Input,
    /// Morph integration and the frame snapshot.
    Morph,
    /// Instance buffer updates.
    Instances,
    /// Buffers copied onto rendered transforms.
    Commit,
    /// Camera aim damping and the orbit camera.
    Camera,
}

/// Headless core: state, morph integration, gesture processing, instance
/// updates and camera aim.  Works with `MinimalPlugins`.
#[derive(Default, Clone)]
pub struct DreamTreeCorePlugin {
    pub config: TreeConfig,
}

impl Plugin for DreamTreeCorePlugin {
    fn build(&self, app: &mut App) {
        let config = &self.config;
        app.insert_resource(config.clone())
            .insert_resource(config.morph.clone())
            .insert_resource(config.camera.clone())
            .insert_resource(GestureProcessor::new(config.gesture.clone()))
            .init_resource::<MorphState>()
            .init_resource::<ControlVector>()
            .init_resource::<CameraAim>()
            .init_resource::<FrameTick>()
            .init_resource::<SensorStatus>()
            .configure_sets(
                Update,
                (
                    DreamTreeSet::Input,
                    DreamTreeSet::Morph,
                    DreamTreeSet::Instances,
                    DreamTreeSet::Commit,
                    DreamTreeSet::Camera,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    sensor::poll_gesture_sensor.in_set(DreamTreeSet::Input),
                    (
                        morph::integrate_morph,
                        transform::begin_frame,
                        gesture::release_stale_control,
                    )
                        .chain()
                        .in_set(DreamTreeSet::Morph),
                    (
                        transform::update_populations,
                        transform::animate_topper,
                        transform::spin_tree_root,
                        dust::drift_dust,
                    )
                        .in_set(DreamTreeSet::Instances),
                    transform::commit_instances.in_set(DreamTreeSet::Commit),
                    (camera::aim_camera, camera::orbit_camera)
                        .chain()
                        .in_set(DreamTreeSet::Camera),
                ),
            );
    }
}

/// Full scene: the core plus spawning, keyboard/mouse simulation and, with
/// the `egui` feature, the status overlay.  Needs `DefaultPlugins`.
///
/// Insert a [`GestureSensor`] resource to drive the tree from a camera.
#[derive(Default, Clone)]
pub struct DreamTreePlugin {
    pub config: TreeConfig,
}

impl Plugin for DreamTreePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(DreamTreeCorePlugin {
            config: self.config.clone(),
        })
        .init_resource::<sim::SimBindings>()
        .add_systems(Startup, scene::spawn_tree)
        .add_systems(Update, sim::simulate_gestures.in_set(DreamTreeSet::Input));

        #[cfg(feature = "egui")]
        {
            if !app.is_plugin_added::<bevy_egui::EguiPlugin>() {
                app.add_plugins(bevy_egui::EguiPlugin::default());
            }
            app.add_systems(bevy_egui::EguiPrimaryContextPass, overlay::overlay_ui);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bevy::time::TimeUpdateStrategy;

    use super::*;
    use crate::gesture::{GestureGuess, Landmark};
    use crate::layout::OrnamentKind;
    use crate::transform::{InstanceOf, MorphPopulation, MotionProfile};

    fn headless() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(DreamTreeCorePlugin::default())
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(100)));
        app
    }

    fn element() -> Element {
        Element {
            compact_position: Vec3::new(1.0, 0.0, 0.0),
            dispersed_position: Vec3::new(-4.0, 3.0, 2.0),
            random_phase: 0.5,
            base_scale: 0.2,
            speed: 0.3,
            rotation_offset: Vec3::ZERO,
            tag: PopulationTag::Ornament(OrnamentKind::Metal),
        }
    }

    #[test]
    fn morph_runs_and_instances_follow() {
        let mut app = headless();
        let motion = MotionProfile {
            float_amplitude: 0.0,
            ..MotionProfile::ornament()
        };
        let owner = app
            .world_mut()
            .spawn((
                MorphPopulation {
                    population: Population::new(vec![element()]),
                    motion,
                },
                InstanceBuffer::default(),
            ))
            .id();
        let instance = app
            .world_mut()
            .spawn((Transform::default(), InstanceOf { buffer: owner, index: 0 }))
            .id();

        app.update();
        assert_eq!(
            app.world().get::<Transform>(instance).unwrap().translation,
            element().compact_position
        );

        app.world_mut()
            .resource_mut::<MorphState>()
            .set_target(MorphTarget::Dispersed);
        app.update();
        let mid = app.world().resource::<MorphState>().progress();
        assert!(mid > 0.0 && mid < 1.0);

        for _ in 0..40 {
            app.update();
        }
        assert_eq!(app.world().resource::<MorphState>().progress(), 1.0);
        assert_eq!(
            app.world().get::<Transform>(instance).unwrap().translation,
            element().dispersed_position
        );
    }

    #[test]
    fn gestures_reach_the_camera() {
        let mut app = headless();
        let camera = app
            .world_mut()
            .spawn((
                OrbitCamera {
                    auto_rotate: 0.0,
                    ..OrbitCamera::default()
                },
                Transform::default(),
            ))
            .id();
        let mut hand = vec![Landmark::default(); 21];
        // Left edge of a mirrored image: viewer's right.
        hand[9] = Landmark::new(0.0, 0.5, 0.0);
        let result = Classification::single(Some(GestureGuess::new("Open_Palm", 0.95)), Some(hand));

        app.update();
        {
            let world = app.world_mut();
            let mut processor = world.remove_resource::<GestureProcessor>().unwrap();
            let mut morph = world.remove_resource::<MorphState>().unwrap();
            let mut control = world.remove_resource::<ControlVector>().unwrap();
            processor.apply(&result, &mut morph, &mut control);
            world.insert_resource(processor);
            world.insert_resource(morph);
            world.insert_resource(control);
        }
        for _ in 0..30 {
            app.update();
        }

        assert_eq!(app.world().resource::<MorphState>().target(), MorphTarget::Dispersed);
        let aim = app.world().resource::<CameraAim>();
        assert!(aim.target.x > 3.0 && aim.target.x <= 5.0);

        // The camera stays in front of the tree and turns toward the hand.
        let view = app.world().get::<Transform>(camera).unwrap();
        assert!((view.translation - Vec3::new(0.0, 3.0, 15.0)).length() < 1e-4);
        assert!(view.forward().x > 0.1);
    }
}
