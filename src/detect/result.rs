use std::collections::BTreeMap;

/// Label → number of instances seen in one frame, sorted by label.
pub type ClassCounts = BTreeMap<String, usize>;

/// Result of running detection on a frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    /// Pixel-space box, `[x1, y1, x2, y2]`.
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: [0.0; 4],
        }
    }
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One detection per label, full confidence.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            detections: labels
                .into_iter()
                .map(|label| Detection::new(label, 1.0))
                .collect(),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.detections.iter().any(|d| d.label == label)
    }

    pub fn class_counts(&self) -> ClassCounts {
        let mut counts = ClassCounts::new();
        for detection in &self.detections {
            *counts.entry(detection.label.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// `"dog: 1, poop: 2"`, or `"No detection"` when empty.
pub fn describe_counts(counts: &ClassCounts) -> String {
    if counts.is_empty() {
        return "No detection".to_string();
    }
    counts
        .iter()
        .map(|(label, count)| format!("{}: {}", label, count))
        .collect::<Vec<_>>()
        .join(", ")
}
