//! Confirmation engine.
//!
//! Per-frame presence bits go into an adaptive rolling window. The window is
//! sized from the measured frame rate so it always spans `confirm_secs` of
//! video. Every `confirm_secs` the window average is compared against the
//! threshold. A confirmation is an edge: the window is reset right after it
//! fires.

mod engine;
mod rate;
mod tracker;
mod window;

pub use engine::{
    ConfirmationEngine, EngineSettings, Step, DEFAULT_CONFIRM_SECS, DEFAULT_CONFIRM_THRESHOLD,
    DEFAULT_MIN_WINDOW_CAPACITY, MAX_CONFIRM_SECS,
};
pub use rate::{RateEstimator, DEFAULT_RATE_REFRESH};
pub use tracker::ChangeTracker;
pub use window::{window_capacity, ConfirmationWindow, MAX_WINDOW_CAPACITY};
