pub mod decoder;
pub mod frame;
pub mod source;
pub mod synthetic;

#[cfg(feature = "gstreamer-pipeline")]
pub mod gst_capture;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use decoder::WireFormat;
pub use frame::{PixelLayout, VideoFrame};
pub use source::{SourceDescriptor, VideoSource, VideoStream};
pub use synthetic::SyntheticSource;

#[cfg(feature = "gstreamer-pipeline")]
pub use gst_capture::GstSource;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Source;
