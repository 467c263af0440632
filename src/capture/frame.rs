use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PipelineError;

/// One raw frame from a video source.
///
/// The buffer is owned; a frame moves from the source into the transform
/// pipeline and is dropped there. Nothing keeps a reference to it afterwards.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,

    /// Per-stream sequence number, starting at 1
    pub sequence: u64,

    /// Acquisition timestamp for latency tracking
    pub captured_at: Instant,
}

/// Sample layouts a source may hand us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    /// Single-channel luminance (GRAY8)
    Luma8,
    /// Packed 3-channel RGB
    Rgb8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Luma8 => 1,
            PixelLayout::Rgb8 => 3,
        }
    }
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            layout,
            data,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Bytes the buffer must hold for its declared geometry
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.channels()
    }

    /// Reject frames whose buffer does not match width × height × channels.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::EmptyFrame);
        }
        let expected = self.expected_len();
        if self.data.len() != expected {
            return Err(PipelineError::BufferSize {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}
