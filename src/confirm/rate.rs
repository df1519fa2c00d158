use std::time::Duration;

/// Default interval between frame-rate refreshes.
pub const DEFAULT_RATE_REFRESH: Duration = Duration::from_secs(10);

/// Measures the throughput of the incoming frame stream.
///
/// The first tick of a measurement window only marks its start; every later
/// tick counts one frame. Once more than `refresh` has elapsed, the cached
/// rate becomes `frames / elapsed` and the refreshing tick opens the next
/// window. Until the first refresh the rate is `0.0`.
#[derive(Clone, Debug)]
pub struct RateEstimator {
    refresh: Duration,
    window_start: Option<Duration>,
    frames: u64,
    rate: f64,
}

impl RateEstimator {
    pub fn new(refresh: Duration) -> Self {
        Self {
            refresh,
            window_start: None,
            frames: 0,
            rate: 0.0,
        }
    }

    /// Record one processed frame at `now` and return the current estimate.
    pub fn tick(&mut self, now: Duration) -> f64 {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return self.rate;
        };

        self.frames += 1;
        let elapsed = now.saturating_sub(start);
        if elapsed > self.refresh {
            self.rate = self.frames as f64 / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = Some(now);
        }
        self.rate
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_REFRESH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(estimator: &mut RateEstimator, step: Duration, frames: u32) -> f64 {
        let mut rate = 0.0;
        for i in 0..frames {
            rate = estimator.tick(step * i);
        }
        rate
    }

    #[test]
    fn zero_until_first_refresh() {
        let mut estimator = RateEstimator::default();
        // 40 frames at 4 fps span exactly 9.75s, still inside the first window.
        let rate = feed(&mut estimator, Duration::from_millis(250), 40);
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn refreshes_after_interval() {
        let mut estimator = RateEstimator::default();
        // The 42nd frame lands at 10.25s: 41 frames counted over 10.25s.
        let rate = feed(&mut estimator, Duration::from_millis(250), 42);
        assert_eq!(rate, 4.0);
    }

    #[test]
    fn keeps_cached_rate_between_refreshes() {
        let mut estimator = RateEstimator::default();
        feed(&mut estimator, Duration::from_millis(250), 42);

        // Slow down: the old estimate holds until the next window closes.
        let base = Duration::from_millis(250 * 41);
        for i in 1..=10 {
            assert_eq!(estimator.tick(base + Duration::from_secs(i)), 4.0);
        }
        let rate = estimator.tick(base + Duration::from_secs(11));
        assert!((rate - 1.0).abs() < 1e-9, "rate {}", rate);
    }

    #[test]
    fn exact_interval_does_not_refresh() {
        let mut estimator = RateEstimator::new(Duration::from_secs(1));
        estimator.tick(Duration::ZERO);
        assert_eq!(estimator.tick(Duration::from_secs(1)), 0.0);
        assert!(estimator.tick(Duration::from_millis(1001)) > 0.0);
    }
}
