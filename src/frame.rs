//! Frame buffers.
//!
//! - `Frame`: the caller-owned pixel buffer for the frame being processed. The
//!   ingest loop may overwrite it as soon as `process()` returns, so nothing
//!   downstream holds a reference to it.
//! - `FrameSnapshot`: an owned copy taken before a frame is handed to a
//!   concurrent side effect.
//!
//! Pixels are packed RGB8, row-major, `width * height * 3` bytes.

use anyhow::{anyhow, Result};

pub const BYTES_PER_PIXEL: usize = 3;

pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position of this frame in its source stream.
    pub sequence: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes, expected {} for {}x{} rgb",
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Black frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
            width,
            height,
            sequence: 0,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access for sources that refill the same buffer each frame.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy the pixels out for handoff to another thread.
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            data: self.data.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

/// Owned copy of a frame's pixels.
#[derive(Clone, Debug)]
pub struct FrameSnapshot {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
