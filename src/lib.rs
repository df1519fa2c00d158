//! Detection confirmation engine.
//!
//! Consumes a stream of per-frame detector results and decides, with noise
//! tolerance, when a sustained event ("target present") has happened. Confirmed
//! events trigger alerts (sound, push notification, optional snapshot) that run
//! off the frame loop and are rate-limited by a cool-down.
//!
//! # Module Structure
//!
//! - `confirm`: rate estimation, adaptive rolling window, confirmation engine
//! - `alert`: grace-period filter and fire-and-forget side effects
//! - `detect`: detector backend trait, detection results, prediction decoding
//! - `ingest`: frame sources (synthetic, HTTP snapshot / MJPEG)
//! - `sentinel`: per-frame driver tying detection to the engine
//! - `config`: daemon configuration (file + env)
//! - `clock`, `frame`: shared primitives

pub mod alert;
pub mod clock;
pub mod config;
pub mod confirm;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod sentinel;

pub use alert::{
    AlertDispatcher, AlertSettings, AlertSinks, AudioPlayer, CommandAudioPlayer, FireOutcome,
    FrameStore, JpegFrameStore, LogNotifier, Notifier, PushbulletNotifier, TaskPool,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AlertdConfig, DetectorSettings, SourceSettings};
pub use confirm::{
    window_capacity, ChangeTracker, ConfirmationEngine, ConfirmationWindow, EngineSettings,
    RateEstimator, Step,
};
pub use detect::{
    build_backend, decode_predictions, ClassCounts, Detection, DetectionResult, DetectorBackend,
};
pub use frame::{Frame, FrameSnapshot};
pub use ingest::{FrameSource, SourceStats};
pub use sentinel::Sentinel;
