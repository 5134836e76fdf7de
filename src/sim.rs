//! Keyboard and pointer stand-ins for the camera sensor.
//!
//! Inputs are turned into ordinary [`Classification`]s and go through the
//! same [`GestureProcessor`] as real sensor results.

use bevy::input::ButtonInput;
use bevy::math::Vec2;
use bevy::prelude::{KeyCode, MouseButton, Query, Res, ResMut, Resource, Window, With};
use bevy::window::PrimaryWindow;

use crate::gesture::{
    Classification, ControlVector, GestureConfig, GestureGuess, GestureProcessor, Landmark,
};
use crate::morph::MorphState;

/// Key and button bindings for simulated gestures.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct SimBindings {
    pub open_palm: KeyCode,
    pub closed_fist: KeyCode,
    pub steer: MouseButton,
}

impl Default for SimBindings {
    fn default() -> Self {
        Self {
            open_palm: KeyCode::KeyO,
            closed_fist: KeyCode::KeyF,
            steer: MouseButton::Left,
        }
    }
}

/// Landmark that makes the processor's mapping come out "direct": pointer
/// right steers right, pointer up steers up.
pub fn pointer_landmark(config: &GestureConfig, normalized: Vec2) -> Landmark {
    let n = normalized.clamp(Vec2::ZERO, Vec2::ONE);
    let x = if config.mirror_x { 1.0 - n.x } else { n.x };
    let y = if config.flip_y { n.y } else { 1.0 - n.y };
    Landmark::new(x, y, 0.0)
}

/// Build a classification from simulated inputs.  `None` if nothing is
/// being simulated this frame.
pub fn synthesize(
    config: &GestureConfig,
    open_palm: bool,
    closed_fist: bool,
    pointer: Option<Vec2>,
) -> Option<Classification> {
    let guess = if closed_fist {
        Some(GestureGuess::new("Closed_Fist", 1.0))
    } else if open_palm {
        Some(GestureGuess::new("Open_Palm", 1.0))
    } else {
        None
    };
    let landmarks = pointer.map(|p| {
        let mut hand = vec![Landmark::default(); config.reference_keypoint + 1];
        hand[config.reference_keypoint] = pointer_landmark(config, p);
        hand
    });
    if guess.is_none() && landmarks.is_none() {
        return None;
    }
    Some(Classification::single(guess, landmarks))
}

/// Bevy system: feed keyboard and pointer input through the processor.
pub fn simulate_gestures(
    bindings: Res<SimBindings>,
    keys: Res<ButtonInput<KeyCode>>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut processor: ResMut<GestureProcessor>,
    mut morph: ResMut<MorphState>,
    mut control: ResMut<ControlVector>,
) {
    let pointer = if buttons.pressed(bindings.steer) {
        windows.single().ok().and_then(|window| {
            let size = window.size();
            let cursor = window.cursor_position()?;
            (size.x > 0.0 && size.y > 0.0).then(|| cursor / size)
        })
    } else {
        None
    };

    let Some(result) = synthesize(
        processor.config(),
        keys.just_pressed(bindings.open_palm),
        keys.just_pressed(bindings.closed_fist),
        pointer,
    ) else {
        return;
    };
    if let Some(target) = processor.apply(&result, &mut morph, &mut control).target {
        bevy::log::debug!("simulated gesture -> {}", target.label());
    }
}
