//! GStreamer capture for the visible GigE camera (aravissrc ! appsink)

use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::{info, warn};

use crate::capture::decoder::{decode_frame, WireFormat};
use crate::capture::frame::{PixelLayout, VideoFrame};
use crate::capture::source::{SourceDescriptor, VideoSource, VideoStream};
use crate::error::DeviceError;

/// Builds one appsink pipeline per open
#[derive(Debug, Clone, Default)]
pub struct GstSource;

impl GstSource {
    /// `aravissrc ! video/x-raw,format=GRAY8|RGB,... ! videoconvert ! appsink`
    fn build_pipeline_string(descriptor: &SourceDescriptor) -> String {
        let format = match descriptor.layout {
            PixelLayout::Luma8 => "GRAY8",
            PixelLayout::Rgb8 => "RGB",
        };
        format!(
            "{} ! \
             video/x-raw,format={},width={},height={},framerate={}/1 ! \
             videoconvert ! \
             appsink name=appsink",
            descriptor.device, format, descriptor.width, descriptor.height, descriptor.fps
        )
    }
}

impl VideoSource for GstSource {
    type Stream = GstStream;

    fn open(&self, descriptor: &SourceDescriptor) -> Result<GstStream, DeviceError> {
        let unavailable = |reason: String| DeviceError::Unavailable {
            descriptor: descriptor.device.clone(),
            reason,
        };

        gst::init().map_err(|e| unavailable(format!("Failed to initialize GStreamer: {}", e)))?;

        let pipeline_str = Self::build_pipeline_string(descriptor);
        info!("Pipeline: {}", pipeline_str);

        let pipeline = gst::parse::launch(&pipeline_str)
            .map_err(|e| unavailable(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| unavailable("Failed to create pipeline".into()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| unavailable("Failed to find appsink element".into()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| unavailable("Failed to cast to AppSink".into()))?;

        // Keep only the newest buffer; a slow consumer drops at the source
        appsink.set_property("emit-signals", false);
        appsink.set_property("max-buffers", 1u32);
        appsink.set_property("drop", true);
        appsink.set_property("sync", false);

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| unavailable(format!("Failed to start pipeline: {:?}", e)))?;

        let (state_change, _, _) = pipeline.state(Some(gst::ClockTime::from_seconds(5)));
        match state_change {
            Ok(gst::StateChangeSuccess::Success) | Ok(gst::StateChangeSuccess::Async) => {
                info!("Pipeline started");
            }
            _ => {
                let _ = pipeline.set_state(gst::State::Null);
                return Err(unavailable("pipeline did not reach PLAYING".into()));
            }
        }

        Ok(GstStream {
            pipeline,
            appsink,
            sequence: 0,
        })
    }
}

pub struct GstStream {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    sequence: u64,
}

impl VideoStream for GstStream {
    fn pull(&mut self, timeout: Duration) -> Result<Option<VideoFrame>, DeviceError> {
        let clock = gst::ClockTime::from_nseconds(timeout.as_nanos() as u64);
        let Some(sample) = self.appsink.try_pull_sample(clock) else {
            if self.appsink.is_eos() {
                return Err(DeviceError::Disconnected("end of stream".into()));
            }
            return Ok(None);
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| DeviceError::Transient("Sample contains no buffer".into()))?;
        let map = buffer
            .map_readable()
            .map_err(|_| DeviceError::Transient("Failed to map buffer".into()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| DeviceError::Transient("Sample has no caps".into()))?;
        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|_| DeviceError::Transient("Failed to parse video info from caps".into()))?;

        let (width, height) = (info.width(), info.height());
        // Grey and colour share one sink; the byte count tells them apart
        let wire = if map.size() >= (width * height * 3) as usize {
            WireFormat::Rgb24
        } else {
            WireFormat::Gray8
        };

        self.sequence += 1;
        decode_frame(map.as_slice(), wire, width, height, self.sequence)
            .map(Some)
            .map_err(|e| DeviceError::Transient(e.to_string()))
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        info!("Stopping GStreamer pipeline");
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop pipeline: {:?}", e);
        }
    }
}
