use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Largest window the rate estimate can ask for.
pub const MAX_WINDOW_CAPACITY: usize = 1 << 16;

/// Capacity for a window covering `confirm_secs` of frames at `rate` fps,
/// never below `min` and never above `MAX_WINDOW_CAPACITY` unless `min` is.
pub fn window_capacity(rate: f64, confirm_secs: f64, min: NonZeroUsize) -> NonZeroUsize {
    let wanted = (rate * confirm_secs).ceil();
    if !wanted.is_finite() || wanted <= min.get() as f64 {
        return min;
    }
    // `as` saturates for out-of-range floats.
    let capped = (wanted as usize).min(MAX_WINDOW_CAPACITY);
    NonZeroUsize::new(capped.max(min.get())).unwrap_or(min)
}

/// Fixed-capacity ring of presence bits.
///
/// A new window is filled with zeros up to capacity, so the average starts at
/// zero and only moves as real frames push the zeros out.
#[derive(Clone, Debug)]
pub struct ConfirmationWindow {
    bits: VecDeque<bool>,
    capacity: NonZeroUsize,
    positives: usize,
}

impl ConfirmationWindow {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let mut bits = VecDeque::with_capacity(capacity.get());
        bits.resize(capacity.get(), false);
        Self {
            bits,
            capacity,
            positives: 0,
        }
    }

    /// Append one frame's bit, evicting the oldest when full.
    pub fn append(&mut self, present: bool) {
        if self.bits.len() == self.capacity.get() {
            if let Some(true) = self.bits.pop_front() {
                self.positives -= 1;
            }
        }
        self.bits.push_back(present);
        if present {
            self.positives += 1;
        }
    }

    /// Arithmetic mean of the held bits.
    pub fn average(&self) -> f64 {
        if self.bits.is_empty() {
            return 0.0;
        }
        self.positives as f64 / self.bits.len() as f64
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.positives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn capacity_follows_rate_with_floor() {
        assert_eq!(window_capacity(0.0, 3.0, nz(3)), nz(3));
        assert_eq!(window_capacity(0.5, 3.0, nz(3)), nz(3));
        assert_eq!(window_capacity(4.0, 3.0, nz(3)), nz(12));
        assert_eq!(window_capacity(4.1, 3.0, nz(3)), nz(13));
        assert_eq!(window_capacity(f64::NAN, 3.0, nz(3)), nz(3));
    }

    #[test]
    fn capacity_is_capped() {
        assert_eq!(window_capacity(30.0, 1e12, nz(3)), nz(MAX_WINDOW_CAPACITY));
        assert_eq!(window_capacity(f64::MAX, 3.0, nz(3)), nz(MAX_WINDOW_CAPACITY));
        let big = nz(MAX_WINDOW_CAPACITY + 1);
        assert_eq!(window_capacity(30.0, 1e12, big), big);
    }

    #[test]
    fn new_window_is_zero_filled() {
        let window = ConfirmationWindow::new(nz(4));
        assert_eq!(window.len(), 4);
        assert_eq!(window.positives(), 0);
        assert_eq!(window.average(), 0.0);
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut window = ConfirmationWindow::new(nz(4));
        for _ in 0..4 {
            window.append(true);
        }
        assert_eq!(window.average(), 1.0);

        window.append(false);
        assert_eq!(window.len(), 4);
        assert_eq!(window.positives(), 3);
        assert_eq!(window.average(), 0.75);
    }

    #[test]
    fn partial_fill_counts_leading_zeros() {
        let mut window = ConfirmationWindow::new(nz(12));
        for _ in 0..6 {
            window.append(true);
        }
        assert_eq!(window.average(), 0.5);
    }
}
