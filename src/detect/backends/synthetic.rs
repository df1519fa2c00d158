use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionResult;
use crate::frame::Frame;

/// Noisy detector: reports the target label with probability `p` per frame.
///
/// Seeded, so a run can be reproduced when tuning thresholds.
pub struct SyntheticBackend {
    label: String,
    probability: f64,
    rng: StdRng,
}

impl SyntheticBackend {
    pub fn new(label: impl Into<String>, probability: f64, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(anyhow!(
                "synthetic detection probability must be within [0, 1], got {}",
                probability
            ));
        }
        Ok(Self {
            label: label.into(),
            probability,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl DetectorBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult> {
        if self.rng.gen_bool(self.probability) {
            Ok(DetectionResult::from_labels([self.label.as_str()]))
        } else {
            Ok(DetectionResult::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let frame = Frame::blank(1, 1);
        let mut a = SyntheticBackend::new("poop", 0.5, 42).unwrap();
        let mut b = SyntheticBackend::new("poop", 0.5, 42).unwrap();
        for _ in 0..64 {
            assert_eq!(
                a.detect(&frame).unwrap().contains("poop"),
                b.detect(&frame).unwrap().contains("poop")
            );
        }
    }

    #[test]
    fn extremes_are_deterministic() {
        let frame = Frame::blank(1, 1);
        let mut never = SyntheticBackend::new("poop", 0.0, 1).unwrap();
        let mut always = SyntheticBackend::new("poop", 1.0, 1).unwrap();
        for _ in 0..32 {
            assert!(!never.detect(&frame).unwrap().contains("poop"));
            assert!(always.detect(&frame).unwrap().contains("poop"));
        }
    }

    #[test]
    fn rejects_out_of_range_probability() {
        assert!(SyntheticBackend::new("poop", 1.5, 0).is_err());
        assert!(SyntheticBackend::new("poop", f64::NAN, 0).is_err());
    }
}
