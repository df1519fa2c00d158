use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};

use crate::frame::FrameSnapshot;

/// Persists a frame snapshot and returns where it landed.
pub trait FrameStore: Send + Sync {
    fn save(&self, snapshot: &FrameSnapshot) -> Result<PathBuf>;
}

/// `<prefix>-YYYYMMDD-HHMMSS.jpg`. Two snapshots in the same second share a name.
pub fn snapshot_file_name(prefix: &str, at: &DateTime<Local>) -> String {
    format!("{}-{}.jpg", prefix, at.format("%Y%m%d-%H%M%S"))
}

/// Writes snapshots as JPEG files into a directory, created on demand.
#[derive(Clone, Debug)]
pub struct JpegFrameStore {
    dir: PathBuf,
    prefix: String,
}

impl JpegFrameStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_at(&self, snapshot: &FrameSnapshot, at: &DateTime<Local>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create snapshot dir {}", self.dir.display()))?;
        let path = self.dir.join(snapshot_file_name(&self.prefix, at));

        let image = RgbImage::from_raw(snapshot.width, snapshot.height, snapshot.data.clone())
            .ok_or_else(|| {
                anyhow!(
                    "snapshot buffer does not match {}x{}",
                    snapshot.width,
                    snapshot.height
                )
            })?;
        image
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        Ok(path)
    }
}

impl FrameStore for JpegFrameStore {
    fn save(&self, snapshot: &FrameSnapshot) -> Result<PathBuf> {
        self.save_at(snapshot, &Local::now())
    }
}
