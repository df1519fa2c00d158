mod backend;
mod backends;
mod predictions;
mod result;

use anyhow::{anyhow, Result};

pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, SyntheticBackend};
pub use predictions::decode_predictions;
pub use result::{describe_counts, ClassCounts, Detection, DetectionResult};

use crate::config::DetectorSettings;

/// Build the configured backend by name.
pub fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend.as_str() {
        "scripted" => Ok(Box::new(ScriptedBackend::new(
            settings.target_label.clone(),
            &settings.pattern,
        )?)),
        "synthetic" => Ok(Box::new(SyntheticBackend::new(
            settings.target_label.clone(),
            settings.probability,
            settings.seed,
        )?)),
        other => Err(anyhow!(
            "unknown detector backend '{}'; expected scripted or synthetic",
            other
        )),
    }
}
