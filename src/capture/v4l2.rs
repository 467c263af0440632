//! V4L2 capture for the thermal camera's UVC interface

use std::io;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::decoder::{decode_frame, WireFormat};
use crate::capture::frame::{PixelLayout, VideoFrame};
use crate::capture::source::{SourceDescriptor, VideoSource, VideoStream};
use crate::error::DeviceError;

const BUFFER_COUNT: u32 = 4;

/// Opens `/dev/videoN` devices with memory-mapped buffers
#[derive(Debug, Clone, Default)]
pub struct V4l2Source;

impl VideoSource for V4l2Source {
    type Stream = V4l2Stream;

    fn open(&self, descriptor: &SourceDescriptor) -> Result<V4l2Stream, DeviceError> {
        info!("Initializing V4L2 capture: {}", descriptor.device);
        let unavailable = |reason: String| DeviceError::Unavailable {
            descriptor: descriptor.device.clone(),
            reason,
        };

        let device = Device::with_path(&descriptor.device).map_err(|e| unavailable(e.to_string()))?;
        let caps = device.query_caps().map_err(|e| unavailable(e.to_string()))?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(unavailable("device doesn't support video capture".into()));
        }

        // Luma sources come over YUYV, colour over MJPEG
        let requested = match descriptor.layout {
            PixelLayout::Luma8 => WireFormat::Yuyv4,
            PixelLayout::Rgb8 => WireFormat::Mjpeg,
        };
        let mut fmt = device.format().map_err(|e| unavailable(e.to_string()))?;
        fmt.width = descriptor.width;
        fmt.height = descriptor.height;
        fmt.fourcc = FourCC::new(requested.fourcc());
        let fmt = device.set_format(&fmt).map_err(|e| unavailable(e.to_string()))?;

        // The driver may substitute its own format
        let wire = WireFormat::from_fourcc(&fmt.fourcc.repr)
            .ok_or_else(|| unavailable(format!("unsupported pixel format {}", fmt.fourcc)))?;
        if wire != requested {
            warn!("{} negotiated {:?} instead of {:?}", descriptor.device, wire, requested);
        }

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| unavailable(e.to_string()))?;
        info!("Capture stream started with {} buffers", BUFFER_COUNT);

        Ok(V4l2Stream {
            _device: device,
            stream,
            wire,
            width: fmt.width,
            height: fmt.height,
            sequence: 0,
        })
    }
}

pub struct V4l2Stream {
    _device: Device,
    stream: MmapStream<'static>,
    wire: WireFormat,
    width: u32,
    height: u32,
    sequence: u64,
}

impl VideoStream for V4l2Stream {
    #[instrument(skip(self))]
    fn pull(&mut self, timeout: Duration) -> Result<Option<VideoFrame>, DeviceError> {
        self.stream.set_timeout(timeout);
        let buf = match self.stream.next() {
            Ok((buf, _meta)) => buf,
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                return Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DeviceError::Disconnected(e.to_string()))
            }
            Err(e) => return Err(DeviceError::Transient(e.to_string())),
        };

        self.sequence += 1;
        match decode_frame(buf, self.wire, self.width, self.height, self.sequence) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                // Corrupt MJPEG happens on USB hiccups; skip the frame
                debug!("Dropping undecodable frame {}: {}", self.sequence, e);
                Ok(None)
            }
        }
    }
}
