//! `dream_tree` — the full scene in a window.
//!
//! Run with:
//!   cargo run --example dream_tree --features egui
//!   cargo run --example dream_tree --features egui -- config.json
//!   cargo run --example dream_tree --features egui -- --waving-hand
//!
//! Keys: `O` scatters, `F` restores; hold the left mouse button to steer.
//! `--waving-hand` installs a synthetic sensor that alternates gestures
//! every few seconds while circling the camera.

use std::time::Instant;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy_dream_tree::gesture::{Classification, GestureGuess, Landmark};
use bevy_dream_tree::sensor::{
    Classifier, ClassifierOptions, GestureSensor, SensorBackend, SensorError, VideoFrame, VideoSource,
    denylist_layer,
};
use bevy_dream_tree::{DreamTreePlugin, TreeConfig};

fn load_config(path: &str) -> TreeConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            eprintln!("ignoring {path}: {e}");
            TreeConfig::default()
        }),
        Err(e) => {
            eprintln!("cannot read {path}: {e}");
            TreeConfig::default()
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let waving = args.iter().any(|a| a == "--waving-hand");
    let config = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(|path| load_config(path))
        .unwrap_or_default();

    let mut app = App::new();
    // Read by `denylist_layer` while the log plugin builds.
    app.insert_resource(config.sensor.log_filter.clone());
    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "bevy_dream_tree".into(),
                    resolution: (1280, 800).into(),
                    ..default()
                }),
                ..default()
            })
            .set(LogPlugin {
                filter: config.sensor.log_filter.directive(),
                custom_layer: denylist_layer,
                ..default()
            }),
    );

    if waving {
        app.insert_resource(GestureSensor::spawn(WavingHand, config.sensor.clone()));
    }

    app.add_plugins(DreamTreePlugin { config }).run();
}

/// Synthetic backend: a 30 fps "camera" and a hand that opens and closes.
struct WavingHand;

impl SensorBackend for WavingHand {
    fn open_camera(&mut self) -> Result<Box<dyn VideoSource>, SensorError> {
        Ok(Box::new(Clock {
            started: Instant::now(),
        }))
    }

    fn load_classifier(&mut self, options: &ClassifierOptions) -> Result<Box<dyn Classifier>, SensorError> {
        info!("loading synthetic classifier ({:?})", options.delegate);
        Ok(Box::new(Wave { frames: 0 }))
    }
}

struct Clock {
    started: Instant,
}

impl VideoSource for Clock {
    fn poll_frame(&mut self) -> Result<Option<VideoFrame>, SensorError> {
        // Quantised to 30 fps; repeats are skipped by the worker.
        let t = (self.started.elapsed().as_secs_f64() * 30.0).floor() / 30.0;
        Ok(Some(VideoFrame {
            timestamp: t,
            width: 320,
            height: 240,
        }))
    }
}

struct Wave {
    frames: u64,
}

impl Classifier for Wave {
    fn classify(&mut self, frame: &VideoFrame, _timestamp_ms: u64) -> Result<Classification, SensorError> {
        self.frames += 1;
        let t = frame.timestamp as f32;
        let gesture = if (t / 6.0) as u32 % 2 == 0 {
            "Open_Palm"
        } else {
            "Closed_Fist"
        };
        let mut hand = vec![Landmark::default(); 21];
        hand[9] = Landmark::new(0.5 + 0.3 * (t * 0.7).cos(), 0.5 + 0.2 * (t * 0.7).sin(), 0.0);
        Ok(Classification::single(Some(GestureGuess::new(gesture, 0.9)), Some(hand)))
    }

    fn diagnostics(&mut self) -> Vec<String> {
        if self.frames == 1 {
            vec![
                "INFO: Created TensorFlow Lite XNNPACK delegate for CPU.".to_owned(),
                "synthetic hand tracking started".to_owned(),
            ]
        } else {
            Vec::new()
        }
    }
}
