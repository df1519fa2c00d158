//! HTTP camera source.
//!
//! Connects to a camera URL. A `multipart/*` response is read as an MJPEG
//! stream; anything else is treated as a snapshot endpoint and re-fetched for
//! every frame.

use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::time::{Duration, Instant};

use super::{frame_interval, SourceStats};
use crate::config::SourceSettings;
use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a fresh connection may go without a frame and still count as healthy.
const CONNECT_GRACE: Duration = Duration::from_secs(5);
const MIN_FRAME_GRACE: Duration = Duration::from_secs(2);

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;

pub struct HttpSource {
    settings: SourceSettings,
    agent: ureq::Agent,
    stream: Option<HttpStream>,
    connected_at: Option<Instant>,
    last_frame_at: Option<Instant>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    Snapshot,
}

impl HttpSource {
    pub fn new(settings: SourceSettings) -> Self {
        // MJPEG bodies never end, so only connect and per-read timeouts apply.
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(HTTP_TIMEOUT)
            .timeout_read(HTTP_TIMEOUT)
            .build();
        Self {
            settings,
            agent,
            stream: None,
            connected_at: None,
            last_frame_at: None,
            frame_count: 0,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        let response = self
            .agent
            .get(&self.settings.url)
            .call()
            .with_context(|| format!("connect to camera {}", self.settings.url))?;
        let multipart = response
            .header("Content-Type")
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/"));
        self.stream = Some(if multipart {
            HttpStream::Mjpeg(MjpegStream::new(response.into_reader()))
        } else {
            HttpStream::Snapshot
        });
        self.connected_at = Some(Instant::now());
        log::info!(
            "source: connected to {} ({})",
            self.settings.url,
            if multipart { "mjpeg" } else { "snapshot" }
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        let jpeg = match self.stream.as_mut() {
            Some(HttpStream::Mjpeg(stream)) => stream.read_next_jpeg()?,
            Some(HttpStream::Snapshot) => fetch_jpeg(&self.agent, &self.settings.url)?,
            None => return Err(anyhow!("http source not connected; call connect() first")),
        };

        let rgb = image::load_from_memory(&jpeg)
            .context("decode jpeg")?
            .into_rgb8();
        let (width, height) = rgb.dimensions();

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Frame::new(rgb.into_raw(), width, height, self.frame_count)
    }

    pub fn is_healthy(&self) -> bool {
        match (self.connected_at, self.last_frame_at) {
            (None, _) => false,
            (Some(connected), None) => connected.elapsed() <= CONNECT_GRACE,
            (Some(_), Some(last)) => last.elapsed() <= frame_grace(self.settings.target_fps),
        }
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.settings.url.clone(),
        }
    }
}

/// Pulls JPEG images out of a `multipart/x-mixed-replace` body.
///
/// Images are cut at their SOI/EOI markers rather than at boundary lines, so
/// cameras that omit `Content-Length` or pad between parts still work.
struct MjpegStream {
    reader: BufReader<Box<dyn Read + Send + Sync>>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send + Sync>) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut jpeg = Vec::new();
        let mut prev = 0u8;
        loop {
            let chunk = self.reader.fill_buf().context("read mjpeg stream")?;
            if chunk.is_empty() {
                return Err(anyhow!("mjpeg stream ended"));
            }

            let mut used = 0;
            let mut complete = false;
            for &byte in chunk {
                used += 1;
                if jpeg.is_empty() {
                    if prev == 0xFF && byte == SOI {
                        jpeg.extend_from_slice(&[0xFF, SOI]);
                    }
                } else {
                    jpeg.push(byte);
                    if prev == 0xFF && byte == EOI {
                        complete = true;
                        break;
                    }
                    if jpeg.len() > MAX_JPEG_BYTES {
                        return Err(anyhow!("mjpeg part exceeds {} bytes", MAX_JPEG_BYTES));
                    }
                }
                prev = byte;
            }
            self.reader.consume(used);
            if complete {
                return Ok(jpeg);
            }
        }
    }
}

fn fetch_jpeg(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    let response = agent
        .get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let declared = response
        .header("Content-Length")
        .and_then(|len| len.trim().parse::<usize>().ok());
    if let Some(len) = declared.filter(|len| *len > MAX_JPEG_BYTES) {
        return Err(anyhow!("snapshot of {} bytes exceeds {} bytes", len, MAX_JPEG_BYTES));
    }

    let mut bytes = Vec::with_capacity(declared.unwrap_or(64 * 1024));
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64 + 1)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    check_snapshot(&bytes)?;
    Ok(bytes)
}

fn check_snapshot(bytes: &[u8]) -> Result<()> {
    if bytes.len() > MAX_JPEG_BYTES {
        return Err(anyhow!("snapshot exceeds {} bytes", MAX_JPEG_BYTES));
    }
    if !bytes.starts_with(&[0xFF, SOI]) {
        return Err(anyhow!("snapshot is not a jpeg ({} bytes)", bytes.len()));
    }
    Ok(())
}

/// Six frame intervals, never under two seconds.
fn frame_grace(target_fps: u32) -> Duration {
    (frame_interval(target_fps) * 6).max(MIN_FRAME_GRACE)
}
