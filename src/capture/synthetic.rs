//! Test-pattern source used when no camera is attached

use std::time::{Duration, Instant};

use tracing::info;

use super::frame::{PixelLayout, VideoFrame};
use super::source::{SourceDescriptor, VideoSource, VideoStream};
use crate::error::DeviceError;

/// Generates a drifting diagonal gradient at the descriptor's frame rate.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource;

impl VideoSource for SyntheticSource {
    type Stream = SyntheticStream;

    fn open(&self, descriptor: &SourceDescriptor) -> Result<SyntheticStream, DeviceError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(DeviceError::Unavailable {
                descriptor: descriptor.device.clone(),
                reason: "zero-sized test pattern".into(),
            });
        }
        info!(
            "Synthetic source {} {}x{} @ {} fps",
            descriptor.device, descriptor.width, descriptor.height, descriptor.fps
        );
        Ok(SyntheticStream {
            descriptor: descriptor.clone(),
            interval: Duration::from_secs(1) / descriptor.fps.max(1),
            next_due: Instant::now(),
            sequence: 0,
        })
    }
}

pub struct SyntheticStream {
    descriptor: SourceDescriptor,
    interval: Duration,
    next_due: Instant,
    sequence: u64,
}

impl SyntheticStream {
    fn render(&self) -> Vec<u8> {
        let w = self.descriptor.width as usize;
        let h = self.descriptor.height as usize;
        let shift = self.sequence as usize;
        let channels = self.descriptor.layout.channels();
        let mut data = Vec::with_capacity(w * h * channels);
        for y in 0..h {
            for x in 0..w {
                let v = ((x + y + shift) * 255 / (w + h).max(1)) as u8;
                match self.descriptor.layout {
                    PixelLayout::Luma8 => data.push(v),
                    PixelLayout::Rgb8 => data.extend_from_slice(&[v, v / 2, 255 - v]),
                }
            }
        }
        data
    }
}

impl VideoStream for SyntheticStream {
    fn pull(&mut self, timeout: Duration) -> Result<Option<VideoFrame>, DeviceError> {
        let now = Instant::now();
        if now < self.next_due {
            let wait = self.next_due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            std::thread::sleep(wait);
        }
        self.next_due = Instant::now() + self.interval;
        self.sequence += 1;
        Ok(Some(VideoFrame::new(
            self.descriptor.width,
            self.descriptor.height,
            self.descriptor.layout,
            self.render(),
            self.sequence,
        )))
    }
}
