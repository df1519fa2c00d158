use anyhow::Result;

use super::SourceStats;
use crate::config::SourceSettings;
use crate::frame::{Frame, BYTES_PER_PIXEL};

/// Synthetic gradient frames for `stub://` sources.
pub struct SyntheticSource {
    settings: SourceSettings,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            frame_count: 0,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        log::info!("source: connected to {} (synthetic)", self.settings.url);
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let (width, height) = (self.settings.width, self.settings.height);
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        let pixels = (0..len)
            .map(|i| ((i as u64 + self.frame_count) % 256) as u8)
            .collect();
        Frame::new(pixels, width, height, self.frame_count)
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.settings.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_match_configured_size() {
        let mut source = SyntheticSource::new(SourceSettings {
            url: "stub://camera".to_string(),
            width: 8,
            height: 4,
            ..SourceSettings::default()
        });
        source.connect().unwrap();

        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!(first.pixels().len(), 8 * 4 * 3);
        assert_eq!(second.sequence, 2);
        assert_ne!(first.pixels(), second.pixels());
        assert_eq!(source.stats().frames_captured, 2);
    }
}
