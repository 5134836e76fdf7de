//! Status overlay (feature `egui`).
//!
//! Read-only view of the morph target and the sensor, plus manual
//! scatter/restore buttons while no sensor is tracking.

use bevy::prelude::{Res, ResMut};
use bevy_egui::{EguiContexts, egui};

use crate::morph::{MorphState, MorphTarget};
use crate::sensor::SensorStatus;

const LEGEND: [(&str, &str); 3] = [
    ("Open palm", "scatter into the dream"),
    ("Closed fist", "restore the tree"),
    ("Move hand", "steer the camera"),
];

/// Bevy system, scheduled in `EguiPrimaryContextPass`.
pub fn overlay_ui(mut contexts: EguiContexts, status: Res<SensorStatus>, mut morph: ResMut<MorphState>) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };

    egui::Window::new("dream_tree_overlay")
        .title_bar(false)
        .resizable(false)
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(12.0, 12.0))
        .show(ctx, |ui| {
            ui.heading(morph.target().label());
            ui.label(status.label());
            ui.separator();
            for (gesture, action) in LEGEND {
                ui.horizontal(|ui| {
                    ui.strong(gesture);
                    ui.label(action);
                });
            }

            if !status.is_active() {
                ui.separator();
                ui.small("O / F keys, drag with the left mouse button to steer");
                ui.horizontal(|ui| {
                    if ui.button("Scatter").clicked() {
                        morph.set_target(MorphTarget::Dispersed);
                    }
                    if ui.button("Restore").clicked() {
                        morph.set_target(MorphTarget::Compact);
                    }
                });
            }
        });
}
