use anyhow::{anyhow, Result};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::alert::{AlertDispatcher, FireOutcome};
use crate::clock::Clock;
use crate::frame::Frame;

use super::rate::{RateEstimator, DEFAULT_RATE_REFRESH};
use super::tracker::ChangeTracker;
use super::window::{window_capacity, ConfirmationWindow, MAX_WINDOW_CAPACITY};

pub const DEFAULT_CONFIRM_SECS: f64 = 3.0;
pub const DEFAULT_CONFIRM_THRESHOLD: f64 = 0.75;
pub const DEFAULT_MIN_WINDOW_CAPACITY: usize = 3;
pub const MAX_CONFIRM_SECS: f64 = 3600.0;

#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Window duration. Sizes the window and spaces evaluations.
    pub confirm_secs: f64,
    /// Average at or above this confirms.
    pub threshold: f64,
    pub min_window_capacity: usize,
    pub rate_refresh: Duration,
    /// Label named in likelihood log lines.
    pub target_label: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            confirm_secs: DEFAULT_CONFIRM_SECS,
            threshold: DEFAULT_CONFIRM_THRESHOLD,
            min_window_capacity: DEFAULT_MIN_WINDOW_CAPACITY,
            rate_refresh: DEFAULT_RATE_REFRESH,
            target_label: "poop".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.confirm_secs.is_finite() || self.confirm_secs <= 0.0 {
            return Err(anyhow!(
                "confirm_secs must be a positive number of seconds, got {}",
                self.confirm_secs
            ));
        }
        if self.confirm_secs > MAX_CONFIRM_SECS {
            return Err(anyhow!(
                "confirm_secs must be at most {}, got {}",
                MAX_CONFIRM_SECS,
                self.confirm_secs
            ));
        }
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(anyhow!(
                "confirm threshold must be within [0, 1], got {}",
                self.threshold
            ));
        }
        if !(2..=MAX_WINDOW_CAPACITY).contains(&self.min_window_capacity) {
            return Err(anyhow!(
                "min window capacity must be within [2, {}], got {}",
                MAX_WINDOW_CAPACITY,
                self.min_window_capacity
            ));
        }
        if self.rate_refresh.is_zero() {
            return Err(anyhow!("rate refresh interval must be greater than zero"));
        }
        Ok(())
    }
}

/// Result of feeding one frame to the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// Frame recorded; not yet time to evaluate.
    Accumulating,
    /// Evaluated, but the average equals the previous evaluation.
    Unchanged { average: f64 },
    BelowThreshold { average: f64 },
    /// Confirmed edge. The window has been reset and the dispatcher fired.
    Confirmed { average: f64, alert: FireOutcome },
}

/// Turns per-frame presence bits into confirmed events.
///
/// Single-writer: `process` takes `&mut self` and is driven by the frame loop.
pub struct ConfirmationEngine {
    settings: EngineSettings,
    min_capacity: NonZeroUsize,
    confirm_period: Duration,
    clock: Arc<dyn Clock>,
    rate: RateEstimator,
    window: ConfirmationWindow,
    /// Last sized capacity; 0 until the window is first sized from a real rate.
    window_len: ChangeTracker<usize>,
    rolling_avg: ChangeTracker<f64>,
    last_check: Duration,
    dispatcher: AlertDispatcher,
}

impl ConfirmationEngine {
    pub fn new(
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
        dispatcher: AlertDispatcher,
    ) -> Result<Self> {
        settings.validate()?;
        let min_capacity = NonZeroUsize::new(settings.min_window_capacity)
            .ok_or_else(|| anyhow!("min window capacity must be non-zero"))?;
        let confirm_period = Duration::try_from_secs_f64(settings.confirm_secs)
            .map_err(|e| anyhow!("confirm_secs out of range: {}", e))?;
        let last_check = clock.now();
        Ok(Self {
            confirm_period,
            rate: RateEstimator::new(settings.rate_refresh),
            window: ConfirmationWindow::new(min_capacity),
            window_len: ChangeTracker::new(0),
            rolling_avg: ChangeTracker::new(0.0),
            min_capacity,
            settings,
            clock,
            last_check,
            dispatcher,
        })
    }

    /// Feed one frame's presence bit. `frame` is only read on a confirmed edge.
    pub fn process(&mut self, present: bool, frame: &Frame) -> Step {
        let now = self.clock.now();
        let rate = self.rate.tick(now);

        if *self.window_len.current() == 0 && rate > 0.0 {
            self.reset_window(rate);
        }

        self.window.append(present);

        if now < self.last_check + self.confirm_period {
            return Step::Accumulating;
        }
        self.last_check = now;

        let average = self.window.average();
        self.rolling_avg.update(average);
        if !self.rolling_avg.changed() {
            return Step::Unchanged { average };
        }

        log::info!(
            "{} likelihood: {:.2}%",
            self.settings.target_label,
            average * 100.0
        );

        if average < self.settings.threshold {
            return Step::BelowThreshold { average };
        }

        // A still-full window would confirm again on the next tick.
        self.reset_window(rate);
        log::info!("{} confirmed", self.settings.target_label);
        let alert = self.dispatcher.fire(frame);
        Step::Confirmed { average, alert }
    }

    fn reset_window(&mut self, rate: f64) {
        let capacity = window_capacity(rate, self.settings.confirm_secs, self.min_capacity);
        self.window_len.update(capacity.get());
        if self.window_len.changed() {
            log::info!(
                "fps: {:.2}, confirmation window adjusted to {} frames",
                rate,
                capacity
            );
        }
        self.window = ConfirmationWindow::new(capacity);
    }

    pub fn rate(&self) -> f64 {
        self.rate.rate()
    }

    pub fn window(&self) -> &ConfirmationWindow {
        &self.window
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }
}
