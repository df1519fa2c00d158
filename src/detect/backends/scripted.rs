use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionResult;
use crate::frame::Frame;

/// Replays a fixed presence pattern, one character per frame, cycling.
///
/// `'1'` reports the target label, `'0'` reports nothing. Used for demos and
/// dry runs of the alert path without a model.
pub struct ScriptedBackend {
    label: String,
    pattern: Vec<bool>,
    position: usize,
}

impl ScriptedBackend {
    pub fn new(label: impl Into<String>, pattern: &str) -> Result<Self> {
        let pattern = pattern
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '1' => Ok(true),
                '0' => Ok(false),
                other => Err(anyhow!("invalid pattern character '{}', expected 0 or 1", other)),
            })
            .collect::<Result<Vec<_>>>()?;
        if pattern.is_empty() {
            return Err(anyhow!("scripted pattern must not be empty"));
        }
        Ok(Self {
            label: label.into(),
            pattern,
            position: 0,
        })
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult> {
        let present = self.pattern[self.position];
        self.position = (self.position + 1) % self.pattern.len();
        if present {
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
    fn cycles_pattern() {
        let mut backend = ScriptedBackend::new("poop", "110").unwrap();
        let frame = Frame::blank(1, 1);
        let seen: Vec<bool> = (0..6)
            .map(|_| backend.detect(&frame).unwrap().contains("poop"))
            .collect();
        assert_eq!(seen, [true, true, false, true, true, false]);
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(ScriptedBackend::new("poop", "").is_err());
        assert!(ScriptedBackend::new("poop", "10x").is_err());
    }
}
