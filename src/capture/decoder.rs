use jpeg_decoder::Decoder;
use serde::{Deserialize, Serialize};

use super::frame::{PixelLayout, VideoFrame};
use crate::error::PipelineError;

/// Formats devices put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFormat {
    Gray8,
    Rgb24,
    Bgr24,
    Yuyv4,
    Mjpeg,
}

impl WireFormat {
    /// Map a V4L2 fourcc to a decodable format
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"GREY" => Some(Self::Gray8),
            b"RGB3" => Some(Self::Rgb24),
            b"BGR3" => Some(Self::Bgr24),
            b"YUYV" => Some(Self::Yuyv4),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }

    pub fn fourcc(self) -> &'static [u8; 4] {
        match self {
            Self::Gray8 => b"GREY",
            Self::Rgb24 => b"RGB3",
            Self::Bgr24 => b"BGR3",
            Self::Yuyv4 => b"YUYV",
            Self::Mjpeg => b"MJPG",
        }
    }
}

/// Turn a raw device buffer into a [`VideoFrame`].
///
/// YUYV keeps only the luminance samples; thermal cores deliver their
/// intensity in Y and leave chroma flat.
pub fn decode_frame(
    data: &[u8],
    format: WireFormat,
    width: u32,
    height: u32,
    sequence: u64,
) -> Result<VideoFrame, PipelineError> {
    let pixels = width as usize * height as usize;
    let frame = match format {
        WireFormat::Gray8 => {
            check_len(data, pixels)?;
            VideoFrame::new(width, height, PixelLayout::Luma8, data[..pixels].to_vec(), sequence)
        }
        WireFormat::Rgb24 => {
            check_len(data, pixels * 3)?;
            VideoFrame::new(width, height, PixelLayout::Rgb8, data[..pixels * 3].to_vec(), sequence)
        }
        WireFormat::Bgr24 => {
            check_len(data, pixels * 3)?;
            let rgb = data[..pixels * 3]
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect();
            VideoFrame::new(width, height, PixelLayout::Rgb8, rgb, sequence)
        }
        WireFormat::Yuyv4 => {
            check_len(data, pixels * 2)?;
            let luma = data[..pixels * 2].iter().step_by(2).copied().collect();
            VideoFrame::new(width, height, PixelLayout::Luma8, luma, sequence)
        }
        WireFormat::Mjpeg => {
            let mut decoder = Decoder::new(data);
            let decoded = decoder
                .decode()
                .map_err(|e| PipelineError::Decode(e.to_string()))?;
            let info = decoder
                .info()
                .ok_or_else(|| PipelineError::Decode("missing JPEG header".into()))?;
            let layout = match info.pixel_format {
                jpeg_decoder::PixelFormat::L8 => PixelLayout::Luma8,
                jpeg_decoder::PixelFormat::RGB24 => PixelLayout::Rgb8,
                other => return Err(PipelineError::UnsupportedFormat(format!("{:?}", other))),
            };
            VideoFrame::new(info.width as u32, info.height as u32, layout, decoded, sequence)
        }
    };
    Ok(frame)
}

fn check_len(data: &[u8], expected: usize) -> Result<(), PipelineError> {
    if data.len() < expected {
        return Err(PipelineError::BufferSize {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
