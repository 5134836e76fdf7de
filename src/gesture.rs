//! Gesture signal processing.
//!
//! The classifier is an opaque collaborator; everything it reports is
//! wrapped into the typed [`Classification`] before the core sees it.
//! [`GestureProcessor::apply`] turns one classification into at most one
//! morph-target request and at most one smoothing step of the
//! [`ControlVector`].
//!
//! ## Gesture → action mapping
//!
//! | Category | Action |
//! |---|---|
//! | `Open_Palm` | scatter into the dispersed form |
//! | `Closed_Fist` | restore the compact form |
//! | anything else | ignored |
//!
//! The tracked landmark (middle-finger MCP by default) drives the camera aim.
//! When no hand is visible the control vector is *held*, not released; see
//! [`GestureConfig::release_after`] for the opt-in timeout.

use bevy::prelude::{Res, ResMut, Resource};

use crate::morph::{MorphState, MorphTarget};
use crate::transform::FrameTick;

/// Recognised gesture categories.  Unknown names are kept for logging.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GestureCategory {
    OpenPalm,
    ClosedFist,
    Other(String),
}

impl GestureCategory {
    /// Parse a classifier category name (`"Open_Palm"`, `"Closed_Fist"`, …).
    pub fn from_name(name: &str) -> Self {
        match name {
            "Open_Palm" => GestureCategory::OpenPalm,
            "Closed_Fist" => GestureCategory::ClosedFist,
            other => GestureCategory::Other(other.to_owned()),
        }
    }

    /// The morph target this gesture requests, if any.
    pub fn morph_target(&self) -> Option<MorphTarget> {
        match self {
            GestureCategory::OpenPalm => Some(MorphTarget::Dispersed),
            GestureCategory::ClosedFist => Some(MorphTarget::Compact),
            GestureCategory::Other(_) => None,
        }
    }
}

impl From<&str> for GestureCategory {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// One ranked guess for one hand.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureGuess {
    pub category: GestureCategory,
    /// Classifier score in `[0, 1]`.
    pub confidence: f32,
}

impl GestureGuess {
    pub fn new(category: impl Into<GestureCategory>, confidence: f32) -> Self {
        Self {
            category: category.into(),
            confidence,
        }
    }
}

/// Normalised image-space keypoint: `x`, `y` in `[0, 1]` from the top-left.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Typed classifier output for one video frame.
///
/// Both outer vectors are per hand; either may be empty.  Each inner gesture
/// list is ranked by descending confidence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub gestures: Vec<Vec<GestureGuess>>,
    pub landmarks: Vec<Vec<Landmark>>,
}

impl Classification {
    /// The first hand's best guess.
    pub fn top_gesture(&self) -> Option<&GestureGuess> {
        self.gestures.first().and_then(|hand| hand.first())
    }

    /// The first hand's landmark set.
    pub fn first_hand(&self) -> Option<&[Landmark]> {
        self.landmarks.first().map(Vec::as_slice)
    }

    /// Single-hand result from one guess and/or one landmark set.
    pub fn single(guess: Option<GestureGuess>, landmarks: Option<Vec<Landmark>>) -> Self {
        Self {
            gestures: guess.map(|g| vec![vec![g]]).unwrap_or_default(),
            landmarks: landmarks.map(|l| vec![l]).unwrap_or_default(),
        }
    }
}

/// Tunables for [`GestureProcessor`].
#[derive(Resource, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Top-gesture confidence must be strictly greater than this.
    pub confidence_threshold: f32,
    /// Fraction of the gap closed per reading (`1.0` = no smoothing).
    pub smoothing: f32,
    /// Index of the tracked keypoint in a landmark set (9 = middle-finger MCP).
    pub reference_keypoint: usize,
    /// Mirror horizontally, matching a front-facing camera preview.
    pub mirror_x: bool,
    /// Flip vertically so the top of the frame maps to `+1`.
    pub flip_y: bool,
    /// Seconds without a landmark before the control vector is released.
    /// `None` holds the last value indefinitely.
    pub release_after: Option<f32>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            smoothing: 0.8,
            reference_keypoint: 9,
            mirror_x: true,
            flip_y: false,
            release_after: None,
        }
    }
}

/// Smoothed 2D control derived from the tracked hand.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlVector {
    /// `[-1, 1]`, positive to the viewer's right.
    pub x: f32,
    /// `[-1, 1]`.
    pub y: f32,
    /// `true` once a hand has been seen.
    pub active: bool,
}

/// What one call to [`GestureProcessor::apply`] changed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GestureOutcome {
    /// Target requested by the top gesture, if it passed the threshold.
    pub target: Option<MorphTarget>,
    /// `true` if the control vector took a smoothing step.
    pub steered: bool,
}

/// Stateful processor; the only writer of [`ControlVector`].
#[derive(Resource, Clone, Debug, Default)]
pub struct GestureProcessor {
    config: GestureConfig,
    since_landmark: f32,
}

impl GestureProcessor {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            since_landmark: 0.0,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Map a normalised keypoint into control space `[-1, 1]²`.
    pub fn control_target(&self, landmark: Landmark) -> (f32, f32) {
        let x = landmark.x.clamp(0.0, 1.0);
        let y = landmark.y.clamp(0.0, 1.0);
        let x = if self.config.mirror_x { 1.0 - x } else { x };
        let y = if self.config.flip_y { 1.0 - y } else { y };
        (x * 2.0 - 1.0, y * 2.0 - 1.0)
    }

    /// Apply one classifier result.
    pub fn apply(
        &mut self,
        result: &Classification,
        morph: &mut MorphState,
        control: &mut ControlVector,
    ) -> GestureOutcome {
        let mut outcome = GestureOutcome::default();

        if let Some(guess) = result.top_gesture() {
            if guess.confidence > self.config.confidence_threshold {
                if let Some(target) = guess.category.morph_target() {
                    morph.set_target(target);
                    outcome.target = Some(target);
                }
            }
        }

        // Non-finite coordinates would poison the smoothed vector for good.
        let keypoint = result
            .first_hand()
            .and_then(|hand| hand.get(self.config.reference_keypoint))
            .filter(|l| l.x.is_finite() && l.y.is_finite());
        if let Some(&landmark) = keypoint {
            let (tx, ty) = self.control_target(landmark);
            let k = self.config.smoothing.clamp(0.0, 1.0);
            *control = ControlVector {
                x: control.x + (tx - control.x) * k,
                y: control.y + (ty - control.y) * k,
                active: true,
            };
            self.since_landmark = 0.0;
            outcome.steered = true;
        }

        outcome
    }

    /// Advance the no-landmark clock; releases the control vector once
    /// [`GestureConfig::release_after`] elapses.  Returns `true` on release.
    pub fn idle(&mut self, dt: f32, control: &mut ControlVector) -> bool {
        self.since_landmark += dt.max(0.0);
        match self.config.release_after {
            Some(limit) if control.active && self.since_landmark >= limit => {
                control.active = false;
                true
            }
            _ => false,
        }
    }
}

/// Bevy system: run the release timer once per frame.
pub fn release_stale_control(
    tick: Res<FrameTick>,
    mut processor: ResMut<GestureProcessor>,
    mut control: ResMut<ControlVector>,
) {
    if processor.config.release_after.is_none() {
        return;
    }
    if processor.idle(tick.dt, &mut control) {
        bevy::log::debug!("hand lost; releasing camera control");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_at(x: f32, y: f32) -> Vec<Landmark> {
        let mut hand = vec![Landmark::default(); 21];
        hand[9] = Landmark::new(x, y, 0.0);
        hand
    }

    fn palm(confidence: f32) -> Classification {
        Classification::single(Some(GestureGuess::new("Open_Palm", confidence)), None)
    }

    #[test]
    fn parses_known_categories() {
        assert_eq!(GestureCategory::from_name("Open_Palm"), GestureCategory::OpenPalm);
        assert_eq!(GestureCategory::from_name("Closed_Fist"), GestureCategory::ClosedFist);
        assert_eq!(
            GestureCategory::from_name("Victory"),
            GestureCategory::Other("Victory".into())
        );
    }

    #[test]
    fn confident_open_palm_disperses() {
        let mut processor = GestureProcessor::default();
        let mut morph = MorphState::default();
        let mut control = ControlVector::default();
        let outcome = processor.apply(&palm(0.9), &mut morph, &mut control);
        assert_eq!(morph.target(), MorphTarget::Dispersed);
        assert_eq!(outcome.target, Some(MorphTarget::Dispersed));
        // Only the target moved; progress is the integrator's job.
        assert_eq!(morph.progress(), 0.0);
    }

    #[test]
    fn weak_gesture_is_ignored() {
        let mut processor = GestureProcessor::default();
        let mut morph = MorphState::default();
        let mut control = ControlVector::default();
        let outcome = processor.apply(&palm(0.1), &mut morph, &mut control);
        assert_eq!(morph.target(), MorphTarget::Compact);
        assert_eq!(outcome.target, None);
        // Threshold is strict.
        processor.apply(&palm(0.4), &mut morph, &mut control);
        assert_eq!(morph.target(), MorphTarget::Compact);
    }

    #[test]
    fn fist_restores_and_unknown_is_ignored() {
        let mut processor = GestureProcessor::default();
        let mut morph = MorphState::new(MorphTarget::Dispersed, 1.0);
        let mut control = ControlVector::default();

        let victory = Classification::single(Some(GestureGuess::new("Victory", 0.99)), None);
        processor.apply(&victory, &mut morph, &mut control);
        assert_eq!(morph.target(), MorphTarget::Dispersed);

        let fist = Classification::single(Some(GestureGuess::new("Closed_Fist", 0.7)), None);
        processor.apply(&fist, &mut morph, &mut control);
        assert_eq!(morph.target(), MorphTarget::Compact);
    }

    #[test]
    fn only_the_top_guess_counts() {
        let mut processor = GestureProcessor::default();
        let mut morph = MorphState::default();
        let mut control = ControlVector::default();
        let result = Classification {
            gestures: vec![vec![
                GestureGuess::new("None", 0.8),
                GestureGuess::new("Open_Palm", 0.7),
            ]],
            landmarks: Vec::new(),
        };
        processor.apply(&result, &mut morph, &mut control);
        assert_eq!(morph.target(), MorphTarget::Compact);
    }

    #[test]
    fn landmark_is_mirrored_and_smoothed() {
        let mut processor = GestureProcessor::default();
        let mut morph = MorphState::default();
        let mut control = ControlVector::default();

        // Hand at the left edge of the image is the viewer's right.
        let result = Classification::single(None, Some(hand_at(0.0, 0.5)));
        let outcome = processor.apply(&result, &mut morph, &mut control);
        assert!(outcome.steered);
        assert!(control.active);
        assert!((control.x - 0.8).abs() < 1e-6);
        assert!(control.y.abs() < 1e-6);

        processor.apply(&result, &mut morph, &mut control);
        assert!((control.x - 0.96).abs() < 1e-6);
    }

    #[test]
    fn control_stays_in_range() {
        let processor = GestureProcessor::default();
        for (x, y) in [(0.0, 0.0), (1.0, 1.0), (-3.0, 7.0), (0.25, 0.75)] {
            let (cx, cy) = processor.control_target(Landmark::new(x, y, 0.0));
            assert!((-1.0..=1.0).contains(&cx));
            assert!((-1.0..=1.0).contains(&cy));
        }
    }

    #[test]
    fn missing_landmarks_hold_the_last_value() {
        let mut processor = GestureProcessor::default();
        let mut morph = MorphState::default();
        let mut control = ControlVector::default();
        processor.apply(
            &Classification::single(None, Some(hand_at(0.2, 0.3))),
            &mut morph,
            &mut control,
        );
        let held = control;
        for _ in 0..10 {
            let outcome = processor.apply(&Classification::default(), &mut morph, &mut control);
            assert!(!outcome.steered);
            processor.idle(0.1, &mut control);
        }
        assert_eq!(control, held);
    }

    #[test]
    fn short_landmark_set_is_skipped() {
        let mut processor = GestureProcessor::default();
        let mut morph = MorphState::default();
        let mut control = ControlVector::default();
        let result = Classification::single(None, Some(vec![Landmark::new(0.1, 0.1, 0.0); 4]));
        processor.apply(&result, &mut morph, &mut control);
        assert!(!control.active);
    }

    #[test]
    fn non_finite_keypoints_are_skipped() {
        let mut processor = GestureProcessor::default();
        let mut morph = MorphState::default();
        let mut control = ControlVector::default();
        processor.apply(
            &Classification::single(None, Some(hand_at(0.25, 0.75))),
            &mut morph,
            &mut control,
        );
        let held = control;
        for (x, y) in [(f32::NAN, 0.5), (0.5, f32::INFINITY), (f32::NEG_INFINITY, f32::NAN)] {
            let outcome = processor.apply(
                &Classification::single(None, Some(hand_at(x, y))),
                &mut morph,
                &mut control,
            );
            assert!(!outcome.steered);
        }
        assert_eq!(control, held);
        assert!(control.x.is_finite() && control.y.is_finite());
    }

    #[test]
    fn release_timeout_deactivates_when_configured() {
        let mut processor = GestureProcessor::new(GestureConfig {
            release_after: Some(1.0),
            ..GestureConfig::default()
        });
        let mut morph = MorphState::default();
        let mut control = ControlVector::default();
        processor.apply(
            &Classification::single(None, Some(hand_at(0.5, 0.5))),
            &mut morph,
            &mut control,
        );
        assert!(!processor.idle(0.6, &mut control));
        assert!(control.active);
        assert!(processor.idle(0.6, &mut control));
        assert!(!control.active);
    }
}
