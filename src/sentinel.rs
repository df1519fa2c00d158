//! Per-frame driver between a detector and the confirmation engine.
//!
//! Logs the detected class counts whenever they change, reduces the detection
//! to "target label present", and feeds the engine.

use crate::confirm::{ChangeTracker, ConfirmationEngine, Step};
use crate::detect::{describe_counts, ClassCounts, DetectionResult};
use crate::frame::Frame;

pub struct Sentinel {
    target_label: String,
    class_counts: ChangeTracker<ClassCounts>,
    engine: ConfirmationEngine,
}

impl Sentinel {
    pub fn new(engine: ConfirmationEngine) -> Self {
        Self {
            target_label: engine.settings().target_label.clone(),
            class_counts: ChangeTracker::default(),
            engine,
        }
    }

    pub fn process(&mut self, detection: &DetectionResult, frame: &Frame) -> Step {
        self.class_counts.update(detection.class_counts());
        if self.class_counts.changed() {
            log::info!("{}", describe_counts(self.class_counts.current()));
        }

        let present = self.class_counts.current().contains_key(&self.target_label);
        self.engine.process(present, frame)
    }

    pub fn engine(&self) -> &ConfirmationEngine {
        &self.engine
    }

    pub fn class_counts(&self) -> &ClassCounts {
        self.class_counts.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertDispatcher, AlertSettings, AlertSinks, FireOutcome, TaskPool};
    use crate::clock::ManualClock;
    use crate::confirm::EngineSettings;
    use std::sync::Arc;

    fn sentinel(clock: Arc<ManualClock>) -> Sentinel {
        let pool = Arc::new(TaskPool::new(1, 2).unwrap());
        let dispatcher = AlertDispatcher::new(
            AlertSettings::default(),
            clock.clone(),
            pool,
            AlertSinks::default(),
        )
        .unwrap();
        let engine = ConfirmationEngine::new(EngineSettings::default(), clock, dispatcher).unwrap();
        Sentinel::new(engine)
    }

    #[test]
    fn only_target_label_counts_as_presence() {
        let clock = Arc::new(ManualClock::new());
        let mut sentinel = sentinel(clock.clone());
        let frame = Frame::blank(1, 1);

        let mut last = Step::Accumulating;
        for t in 1..=3 {
            clock.set_secs(t as f64);
            last = sentinel.process(&DetectionResult::from_labels(["dog"]), &frame);
        }
        assert_eq!(last, Step::Unchanged { average: 0.0 });
        assert_eq!(sentinel.class_counts().get("dog"), Some(&1));

        for t in 4..=6 {
            clock.set_secs(t as f64);
            last = sentinel.process(&DetectionResult::from_labels(["dog", "poop"]), &frame);
        }
        assert_eq!(
            last,
            Step::Confirmed {
                average: 1.0,
                alert: FireOutcome::Dispatched { queued: 0, rejected: 0 },
            }
        );
    }
}
