//! Frame ingestion sources.
//!
//! - `stub://…`: synthetic frames, no I/O (tests, dry runs)
//! - `http(s)://…`: JPEG snapshot endpoint or MJPEG stream from an IP camera
//!
//! Sources hand out owned `Frame`s. Pacing to the target frame rate is the
//! caller's job; sources return frames as fast as they can be produced.

mod http;
mod synthetic;

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use url::Url;

use crate::config::SourceSettings;
use crate::frame::Frame;

pub use http::HttpSource;
pub use synthetic::SyntheticSource;

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

pub enum FrameSource {
    Synthetic(SyntheticSource),
    Http(HttpSource),
}

impl FrameSource {
    pub fn open(settings: &SourceSettings) -> Result<Self> {
        if settings.url.starts_with("stub://") {
            return Ok(Self::Synthetic(SyntheticSource::new(settings.clone())));
        }
        let url = Url::parse(&settings.url)
            .with_context(|| format!("parse source url '{}'", settings.url))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Http(HttpSource::new(settings.clone()))),
            other => Err(anyhow!(
                "unsupported source scheme '{}'; expected stub, http or https",
                other
            )),
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        match self {
            Self::Synthetic(source) => source.connect(),
            Self::Http(source) => source.connect(),
        }
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        match self {
            Self::Synthetic(source) => source.next_frame(),
            Self::Http(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match self {
            Self::Synthetic(_) => true,
            Self::Http(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        match self {
            Self::Synthetic(source) => source.stats(),
            Self::Http(source) => source.stats(),
        }
    }
}

/// Minimum spacing between frames for a target rate; zero means unpaced.
pub fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> SourceSettings {
        SourceSettings {
            url: url.to_string(),
            ..SourceSettings::default()
        }
    }

    #[test]
    fn opens_by_scheme() {
        assert!(matches!(
            FrameSource::open(&settings("stub://camera")).unwrap(),
            FrameSource::Synthetic(_)
        ));
        assert!(matches!(
            FrameSource::open(&settings("http://10.0.0.5/snapshot.jpg")).unwrap(),
            FrameSource::Http(_)
        ));
        assert!(FrameSource::open(&settings("rtsp://10.0.0.5/stream1")).is_err());
        assert!(FrameSource::open(&settings("not a url")).is_err());
    }

    #[test]
    fn frame_interval_from_fps() {
        assert_eq!(frame_interval(0), Duration::ZERO);
        assert_eq!(frame_interval(10), Duration::from_millis(100));
        assert_eq!(frame_interval(5000), Duration::from_millis(1));
    }
}
