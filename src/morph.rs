//! Morph state machine.
//!
//! [`MorphState`] holds a binary [`MorphTarget`] and a linear `progress` in
//! `[0, 1]` that is integrated once per frame toward the target at a fixed
//! rate.  Visual consumers never read `progress` directly; they read
//! [`MorphState::eased`], an ease-in-out-sine remap of it.
//!
//! The gesture processor (and the manual overlay buttons) only ever call
//! [`MorphState::set_target`].  Only [`integrate_morph`] moves `progress`.

use std::f32::consts::PI;

use bevy::prelude::{Res, ResMut, Resource, Time};

/// The form the tree is heading toward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MorphTarget {
    /// The closed "Emerald" cone.
    #[default]
    Compact,
    /// The scattered "Dream" spiral.
    Dispersed,
}

impl MorphTarget {
    /// Progress value this target pulls toward.
    #[inline]
    pub fn goal(self) -> f32 {
        match self {
            MorphTarget::Compact => 0.0,
            MorphTarget::Dispersed => 1.0,
        }
    }

    /// Display label for the overlay.
    pub fn label(self) -> &'static str {
        match self {
            MorphTarget::Compact => "EMERALD MODE",
            MorphTarget::Dispersed => "DREAM MODE",
        }
    }
}

/// Configures how fast the morph runs.
#[derive(Resource, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MorphConfig {
    /// Seconds to traverse the full `[0, 1]` range.
    pub duration_secs: f32,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self { duration_secs: 3.0 }
    }
}

impl MorphConfig {
    /// Progress per second.  Non-positive or non-finite durations snap
    /// (infinite rate).
    pub fn rate(&self) -> f32 {
        if self.duration_secs.is_finite() && self.duration_secs > 0.0 {
            1.0 / self.duration_secs
        } else {
            f32::INFINITY
        }
    }
}

/// Ease-in-out-sine: `(1 - cos(π t)) / 2`.
#[inline]
pub fn ease_in_out_sine(t: f32) -> f32 {
    (1.0 - (PI * t).cos()) * 0.5
}

/// Shared morph state.  Single writer per field: `target` by input handling,
/// `progress` by [`integrate_morph`].
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct MorphState {
    target: MorphTarget,
    progress: f32,
}

impl MorphState {
    pub fn new(target: MorphTarget, progress: f32) -> Self {
        let mut state = Self { target, progress };
        state.progress = state.sanitized_progress();
        state
    }

    #[inline]
    pub fn target(&self) -> MorphTarget {
        self.target
    }

    /// Raw linear progress.  Prefer [`eased`](Self::eased) for visuals.
    #[inline]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Eased progress in `[0, 1]`.
    #[inline]
    pub fn eased(&self) -> f32 {
        ease_in_out_sine(self.progress)
    }

    /// `true` once progress has reached the target's goal.
    pub fn is_settled(&self) -> bool {
        self.progress == self.target.goal()
    }

    /// Request a new target.  Idempotent; the last call before the next
    /// [`advance`](Self::advance) wins.  Never touches progress.
    pub fn set_target(&mut self, target: MorphTarget) {
        self.target = target;
    }

    /// Move progress toward the target's goal by `dt · rate` without
    /// overshooting.  Negative or non-finite `dt` is treated as zero.
    pub fn advance(&mut self, dt: f32, rate: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let rate = if rate.is_nan() { 0.0 } else { rate.max(0.0) };
        let goal = self.target.goal();
        let step = dt * rate;

        self.progress = if step.is_nan() {
            // `0 · ∞`: no time passed, nothing moves.
            self.progress
        } else if self.progress < goal {
            (self.progress + step).min(goal)
        } else if self.progress > goal {
            (self.progress - step).max(goal)
        } else {
            self.progress
        };
        self.progress = self.sanitized_progress();
    }

    fn sanitized_progress(&self) -> f32 {
        debug_assert!(
            self.progress.is_finite() && (0.0..=1.0).contains(&self.progress),
            "morph progress out of range: {}",
            self.progress
        );
        if self.progress.is_finite() {
            self.progress.clamp(0.0, 1.0)
        } else {
            self.target.goal()
        }
    }
}

/// Bevy system: integrate the morph once per frame.
pub fn integrate_morph(time: Res<Time>, config: Res<MorphConfig>, mut morph: ResMut<MorphState>) {
    let rate = config.rate();
    // Skip the write when settled so change detection stays quiet.
    if morph.is_settled() {
        return;
    }
    morph.advance(time.delta_secs(), rate);
}
