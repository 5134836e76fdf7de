//! Background gesture sensor.
//!
//! Camera capture and classification are opaque collaborators behind the
//! [`SensorBackend`], [`VideoSource`] and [`Classifier`] traits.  Each
//! [`GestureSensor`] resource runs them on its own named worker thread and
//! forwards each typed [`Classification`] over a channel;
//! [`poll_gesture_sensor`] drains the channel on the main thread and feeds
//! the results through the [`GestureProcessor`], so every shared write stays
//! on the frame loop.  A worker stuck inside a classifier call never delays
//! a replacement sensor.
//!
//! # Usage
//! ```rust,ignore
//! commands.insert_resource(GestureSensor::spawn(MyBackend::new(), SensorConfig::default()));
//! ```
//!
//! Startup order: camera first, then the classifier with
//! [`ClassifierOptions::gpu`], falling back to
//! [`ClassifierOptions::cpu_fallback`].  Any failure ends in
//! [`SensorStatus::Unavailable`] and the scene keeps running.

use std::fmt;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc,
};
use std::time::Duration;

use bevy::log::BoxedLayer;
use bevy::log::tracing::field::{Field, Visit};
use bevy::log::tracing::{Event, Subscriber};
use bevy::log::tracing_subscriber::Layer;
use bevy::log::tracing_subscriber::layer::Context;
use bevy::prelude::{App, DetectChanges, Res, ResMut, Resource};

use crate::gesture::{Classification, ControlVector, GestureProcessor};
use crate::morph::MorphState;

/// Names worker threads `gesture-sensor-{n}`.
fn next_worker_name() -> String {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    format!("gesture-sensor-{}", NEXT.fetch_add(1, Ordering::Relaxed))
}

// --- errors and status ----------------------------------------------------------

/// Errors raised by a sensor backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SensorError {
    /// Camera access was denied or no device exists.
    CameraUnavailable(String),
    /// Neither the accelerated nor the CPU classifier could be loaded.
    ClassifierInit(String),
    /// One frame failed to classify.  Not fatal.
    Classify(String),
    /// The video source went away mid-run.
    Disconnected,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::CameraUnavailable(why) => write!(f, "camera unavailable: {why}"),
            SensorError::ClassifierInit(why) => write!(f, "classifier init failed: {why}"),
            SensorError::Classify(why) => write!(f, "classification failed: {why}"),
            SensorError::Disconnected => f.write_str("video source disconnected"),
        }
    }
}

impl std::error::Error for SensorError {}

/// Which classifier configuration ended up running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Delegate {
    Gpu,
    Cpu,
}

/// User-visible sensor state.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub enum SensorStatus {
    /// No sensor installed; keyboard and pointer only.
    #[default]
    Disabled,
    Starting,
    Active(Delegate),
    Unavailable(String),
}

impl SensorStatus {
    pub fn label(&self) -> String {
        match self {
            SensorStatus::Disabled => "Sensor off (keyboard/mouse)".to_owned(),
            SensorStatus::Starting => "Starting camera…".to_owned(),
            SensorStatus::Active(Delegate::Gpu) => "Tracking (GPU)".to_owned(),
            SensorStatus::Active(Delegate::Cpu) => "Tracking (CPU)".to_owned(),
            SensorStatus::Unavailable(why) => format!("Sensor unavailable: {why}"),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SensorStatus::Active(_))
    }
}

// --- backend seam ------------------------------------------------------------------

/// One captured frame.  Pixel data stays inside the backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoFrame {
    /// Presentation time in seconds.  Repeats mean "no new frame".
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
}

/// Frame source.  `Ok(None)` means nothing new yet.
pub trait VideoSource: Send {
    fn poll_frame(&mut self) -> Result<Option<VideoFrame>, SensorError>;
}

/// Opaque hand-gesture classifier.
pub trait Classifier: Send {
    fn classify(&mut self, frame: &VideoFrame, timestamp_ms: u64) -> Result<Classification, SensorError>;

    /// Drain backend diagnostic lines accumulated since the last call.
    fn diagnostics(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Classifier load options.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassifierOptions {
    pub delegate: Delegate,
    pub num_hands: usize,
    pub min_hand_detection_confidence: f32,
    pub min_hand_presence_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl ClassifierOptions {
    fn with_confidence(delegate: Delegate, confidence: f32) -> Self {
        Self {
            delegate,
            num_hands: 1,
            min_hand_detection_confidence: confidence,
            min_hand_presence_confidence: confidence,
            min_tracking_confidence: confidence,
        }
    }

    pub fn gpu() -> Self {
        Self::with_confidence(Delegate::Gpu, 0.3)
    }

    /// CPU detection runs with looser thresholds to stay responsive.
    pub fn cpu_fallback() -> Self {
        Self::with_confidence(Delegate::Cpu, 0.15)
    }
}

/// Factory for the camera and classifier.  Moved onto the worker thread.
pub trait SensorBackend: Send + 'static {
    fn open_camera(&mut self) -> Result<Box<dyn VideoSource>, SensorError>;
    fn load_classifier(&mut self, options: &ClassifierOptions) -> Result<Box<dyn Classifier>, SensorError>;
}

// --- configuration -------------------------------------------------------------------

/// Drops classifier diagnostic noise before it reaches the log.
///
/// Insert it as a resource before `DefaultPlugins` and pass
/// [`denylist_layer`] as `LogPlugin::custom_layer` to filter every event,
/// not only the lines a [`Classifier`] reports.
#[derive(Resource, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LogFilter {
    /// Lines containing any of these substrings are dropped.
    pub denylist: Vec<String>,
    /// Targets capped at `error` in [`directive`](Self::directive).
    pub quiet_targets: Vec<String>,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            denylist: ["XNNPACK", "delegate", "Created TensorFlow Lite", "Wasm"]
                .map(String::from)
                .to_vec(),
            quiet_targets: ["wgpu", "naga"].map(String::from).to_vec(),
        }
    }
}

impl LogFilter {
    pub fn allows(&self, line: &str) -> bool {
        !self.denylist.iter().any(|needle| line.contains(needle.as_str()))
    }

    /// Forward a backend line to `bevy::log` unless it is denylisted.
    /// Returns whether it was forwarded.
    pub fn forward(&self, line: &str) -> bool {
        if !self.allows(line) {
            return false;
        }
        bevy::log::debug!(target: "bevy_dream_tree::sensor", "{line}");
        true
    }

    /// Filter directive for `LogPlugin::filter`.
    ///
    /// Directives only select targets and levels; message substrings are
    /// handled by [`DenylistLayer`].
    pub fn directive(&self) -> String {
        let mut parts = vec!["info".to_owned()];
        parts.extend(self.quiet_targets.iter().map(|t| format!("{t}=error")));
        parts.join(",")
    }

    pub fn layer(&self) -> DenylistLayer {
        DenylistLayer {
            filter: self.clone(),
        }
    }
}

/// Subscriber layer that disables events whose message is denylisted.
pub struct DenylistLayer {
    filter: LogFilter,
}

impl<S: Subscriber> Layer<S> for DenylistLayer {
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        let mut message = MessageText::default();
        event.record(&mut message);
        self.filter.allows(&message.0)
    }
}

#[derive(Default)]
struct MessageText(String);

impl Visit for MessageText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// `LogPlugin::custom_layer` hook.  Uses the app's [`LogFilter`] resource,
/// or the default denylist when none was inserted.
pub fn denylist_layer(app: &mut App) -> Option<BoxedLayer> {
    let filter = app.world().get_resource::<LogFilter>().cloned().unwrap_or_default();
    Some(Box::new(filter.layer()))
}

/// Sensor tunables.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Worker sleep when no new frame is available.
    pub poll_interval_ms: u64,
    pub gpu: ClassifierOptions,
    pub cpu: ClassifierOptions,
    pub log_filter: LogFilter,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 16,
            gpu: ClassifierOptions::gpu(),
            cpu: ClassifierOptions::cpu_fallback(),
            log_filter: LogFilter::default(),
        }
    }
}

// --- worker ----------------------------------------------------------------------------

/// Worker → main thread messages.
#[derive(Clone, Debug, PartialEq)]
pub enum SensorMessage {
    Ready(Delegate),
    Failed(SensorError),
    Result(Classification),
}

/// Camera plus loaded classifier; one [`step`](Self::step) per poll.
pub struct SensorWorker {
    source: Box<dyn VideoSource>,
    classifier: Box<dyn Classifier>,
    delegate: Delegate,
    last_timestamp: Option<f64>,
    log_filter: LogFilter,
}

impl SensorWorker {
    /// Open the camera, then load the classifier with fallback.
    pub fn start<B: SensorBackend>(backend: &mut B, config: &SensorConfig) -> Result<Self, SensorError> {
        let source = backend.open_camera()?;
        let (classifier, delegate) = match backend.load_classifier(&config.gpu) {
            Ok(c) => (c, config.gpu.delegate),
            Err(gpu_err) => {
                bevy::log::warn!("accelerated classifier unavailable ({gpu_err}); falling back to CPU");
                let c = backend.load_classifier(&config.cpu).map_err(|cpu_err| {
                    SensorError::ClassifierInit(format!("{gpu_err}; {cpu_err}"))
                })?;
                (c, config.cpu.delegate)
            }
        };
        Ok(Self {
            source,
            classifier,
            delegate,
            last_timestamp: None,
            log_filter: config.log_filter.clone(),
        })
    }

    pub fn delegate(&self) -> Delegate {
        self.delegate
    }

    /// Classify the next fresh frame.
    ///
    /// `Ok(None)` when no new frame exists or classification of this frame
    /// failed; only a lost source is an error.
    pub fn step(&mut self, now_ms: u64) -> Result<Option<Classification>, SensorError> {
        let Some(frame) = self.source.poll_frame()? else {
            return Ok(None);
        };
        if self.last_timestamp == Some(frame.timestamp) {
            return Ok(None);
        }
        self.last_timestamp = Some(frame.timestamp);

        let result = self.classifier.classify(&frame, now_ms);
        for line in self.classifier.diagnostics() {
            self.log_filter.forward(&line);
        }
        match result {
            Ok(classification) => Ok(Some(classification)),
            Err(e) => {
                bevy::log::debug!("skipping frame at {:.3}s: {e}", frame.timestamp);
                Ok(None)
            }
        }
    }
}

/// Resource owning a running sensor worker.
///
/// Dropping it sets a cancellation flag; the worker exits at its next poll
/// and releases the camera and classifier.
#[derive(Resource)]
pub struct GestureSensor {
    // Mutex keeps the resource Sync.
    rx: Mutex<mpsc::Receiver<SensorMessage>>,
    cancelled: Arc<AtomicBool>,
}

impl Drop for GestureSensor {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl GestureSensor {
    /// Start `backend` on a dedicated worker thread.
    pub fn spawn<B: SensorBackend>(mut backend: B, config: SensorConfig) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let (tx, rx) = mpsc::channel();
        let failed = tx.clone();

        let spawned = std::thread::Builder::new()
            .name(next_worker_name())
            .spawn(move || {
                if flag.load(Ordering::Relaxed) {
                    return;
                }
                let mut worker = match SensorWorker::start(&mut backend, &config) {
                    Ok(worker) => worker,
                    Err(e) => {
                        tx.send(SensorMessage::Failed(e)).ok();
                        return;
                    }
                };
                if tx.send(SensorMessage::Ready(worker.delegate())).is_err() {
                    return;
                }

                let started = std::time::Instant::now();
                let idle = Duration::from_millis(config.poll_interval_ms.max(1));
                while !flag.load(Ordering::Relaxed) {
                    let now_ms = started.elapsed().as_millis() as u64;
                    match worker.step(now_ms) {
                        Ok(Some(result)) => {
                            if tx.send(SensorMessage::Result(result)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => std::thread::sleep(idle),
                        Err(e) => {
                            tx.send(SensorMessage::Failed(e)).ok();
                            break;
                        }
                    }
                }
            });

        if let Err(e) = spawned {
            failed
                .send(SensorMessage::Failed(SensorError::ClassifierInit(format!(
                    "could not start sensor thread: {e}"
                ))))
                .ok();
        }
        drop(failed);

        Self {
            rx: Mutex::new(rx),
            cancelled,
        }
    }

    /// Take every message queued since the last call.
    ///
    /// A worker that has gone away without saying why (it panicked) shows
    /// up as a trailing [`SensorError::Disconnected`].
    pub fn drain(&self) -> Vec<SensorMessage> {
        let Ok(rx) = self.rx.lock() else {
            return vec![SensorMessage::Failed(SensorError::Disconnected)];
        };
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(message) => out.push(message),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    out.push(SensorMessage::Failed(SensorError::Disconnected));
                    break;
                }
            }
        }
        out
    }
}

/// Bevy system: apply queued sensor results on the main thread.
pub fn poll_gesture_sensor(
    sensor: Option<Res<GestureSensor>>,
    mut status: ResMut<SensorStatus>,
    mut processor: ResMut<GestureProcessor>,
    mut morph: ResMut<MorphState>,
    mut control: ResMut<ControlVector>,
) {
    let Some(sensor) = sensor else {
        return;
    };
    // Only ever read here, so a change means a sensor was (re)inserted.
    if sensor.is_changed() {
        *status = SensorStatus::Starting;
    } else if matches!(*status, SensorStatus::Unavailable(_)) {
        return;
    }
    for message in sensor.drain() {
        match message {
            SensorMessage::Ready(delegate) => {
                bevy::log::info!("gesture sensor ready ({delegate:?})");
                *status = SensorStatus::Active(delegate);
            }
            SensorMessage::Failed(e) => {
                bevy::log::warn!("gesture sensor stopped: {e}");
                *status = SensorStatus::Unavailable(e.to_string());
                // Let the camera drift back to centre.
                control.active = false;
                return;
            }
            SensorMessage::Result(result) => {
                processor.apply(&result, &mut morph, &mut control);
            }
        }
    }
}
