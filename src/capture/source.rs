//! Video acquisition capability
//!
//! A [`VideoSource`] hides the transport (GigE via GStreamer, UVC via V4L2,
//! a test pattern). Opening yields a [`VideoStream`], which is the device
//! handle: whoever owns the stream owns the device, and dropping it closes
//! the device. Implementations release their resources in `Drop`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::frame::{PixelLayout, VideoFrame};
use crate::error::DeviceError;

/// What to open and how the frames should look
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Device path, pipeline element or backend-specific locator
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub layout: PixelLayout,
}

impl SourceDescriptor {
    pub fn new(device: impl Into<String>, width: u32, height: u32, layout: PixelLayout) -> Self {
        Self {
            device: device.into(),
            width,
            height,
            fps: 30,
            layout,
        }
    }
}

/// Opens video streams
pub trait VideoSource: Send + Sync + 'static {
    type Stream: VideoStream;

    /// Open the device described by `descriptor`.
    ///
    /// Fails with [`DeviceError::Unavailable`] when the device is missing or busy.
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Self::Stream, DeviceError>;
}

/// An open device handle
pub trait VideoStream: Send + 'static {
    /// Poll for the next frame, waiting at most `timeout`.
    ///
    /// `Ok(None)` means no frame was ready; it is not an error.
    fn pull(&mut self, timeout: Duration) -> Result<Option<VideoFrame>, DeviceError>;
}
