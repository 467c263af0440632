//! Frame transform: zoom/crop → palette → resize → crosshair
//!
//! A pure function of (frame, settings snapshot, target size). It consumes
//! the raw frame and returns a new display buffer; nothing is retained.

use std::time::Instant;

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::overlay::draw_crosshair;
use super::palette::PaletteMode;
use super::settings::{ViewSettings, ZoomFactor};
use crate::capture::{PixelLayout, VideoFrame};
use crate::error::PipelineError;

/// Which camera a frame came from; decides which steps apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Visible,
    Thermal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-frame parameters taken from one settings snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub zoom: ZoomFactor,
    pub palette: Option<PaletteMode>,
    pub crosshair: bool,
}

impl TransformParams {
    /// Zoom applies to the visible camera only, palettes to thermal only.
    pub fn for_source(settings: &ViewSettings, kind: SourceKind) -> Self {
        match kind {
            SourceKind::Visible => Self {
                zoom: settings.visible_zoom,
                palette: None,
                crosshair: settings.crosshair,
            },
            SourceKind::Thermal => Self {
                zoom: ZoomFactor::NONE,
                palette: Some(settings.palette),
                crosshair: settings.crosshair,
            },
        }
    }
}

/// Display-ready RGB frame
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub image: RgbImage,
    pub sequence: u64,
    pub captured_at: Instant,
}

impl DisplayFrame {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Centred crop of `width/z × height/z`, rounded down.
pub fn crop_rect(width: u32, height: u32, zoom: ZoomFactor) -> CropRect {
    if !zoom.crops() {
        return CropRect {
            x: 0,
            y: 0,
            width,
            height,
        };
    }
    let z = zoom.get() as f64;
    let cw = ((width as f64 / z).floor() as u32).max(1);
    let ch = ((height as f64 / z).floor() as u32).max(1);
    CropRect {
        x: (width - cw) / 2,
        y: (height - ch) / 2,
        width: cw,
        height: ch,
    }
}

fn crop(frame: &VideoFrame, rect: CropRect) -> Vec<u8> {
    let channels = frame.layout.channels();
    let stride = frame.width as usize * channels;
    let row_len = rect.width as usize * channels;
    let mut out = Vec::with_capacity(row_len * rect.height as usize);
    for row in rect.y..rect.y + rect.height {
        let start = row as usize * stride + rect.x as usize * channels;
        out.extend_from_slice(&frame.data[start..start + row_len]);
    }
    out
}

/// Rec.601 luma
fn luma(rgb: &[u8]) -> u8 {
    ((rgb[0] as u32 * 299 + rgb[1] as u32 * 587 + rgb[2] as u32 * 114) / 1000) as u8
}

fn colourize(data: &[u8], layout: PixelLayout, palette: Option<PaletteMode>) -> Vec<u8> {
    match (layout, palette) {
        (PixelLayout::Rgb8, None) => data.to_vec(),
        (PixelLayout::Luma8, None) => data.iter().flat_map(|&v| [v, v, v]).collect(),
        (PixelLayout::Luma8, Some(mode)) => {
            let lut = mode.lut();
            data.iter().flat_map(|&v| lut[v as usize]).collect()
        }
        (PixelLayout::Rgb8, Some(mode)) => {
            let lut = mode.lut();
            data.chunks_exact(3).flat_map(|px| lut[luma(px) as usize]).collect()
        }
    }
}

/// Run the full transform for one frame.
pub fn transform(
    frame: VideoFrame,
    params: &TransformParams,
    target: FrameSize,
) -> Result<DisplayFrame, PipelineError> {
    frame.validate()?;
    if target.is_empty() {
        return Err(PipelineError::EmptyTarget);
    }

    let rect = crop_rect(frame.width, frame.height, params.zoom);
    let cropped;
    let working: &[u8] = if params.zoom.crops() {
        cropped = crop(&frame, rect);
        &cropped
    } else {
        &frame.data
    };

    let rgb = colourize(working, frame.layout, params.palette);
    let expected = rect.width as usize * rect.height as usize * 3;
    let actual = rgb.len();
    let mut image = RgbImage::from_raw(rect.width, rect.height, rgb)
        .ok_or(PipelineError::BufferSize { expected, actual })?;

    if image.dimensions() != (target.width, target.height) {
        image = imageops::resize(&image, target.width, target.height, FilterType::Triangle);
    }

    // Last, at delivered size
    if params.crosshair {
        draw_crosshair(&mut image);
    }

    Ok(DisplayFrame {
        image,
        sequence: frame.sequence,
        captured_at: frame.captured_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::overlay::{crosshair_arm, CROSSHAIR_COLOR};

    fn luma_frame(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> VideoFrame {
        let mut data = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y));
            }
        }
        VideoFrame::new(w, h, PixelLayout::Luma8, data, 1)
    }

    fn plain(zoom: f32) -> TransformParams {
        TransformParams {
            zoom: ZoomFactor::new(zoom).unwrap(),
            palette: None,
            crosshair: false,
        }
    }

    #[test]
    fn test_crop_rect_2x_on_720p() {
        let rect = crop_rect(1280, 720, ZoomFactor::new(2.0).unwrap());
        assert_eq!(
            rect,
            CropRect {
                x: 320,
                y: 180,
                width: 640,
                height: 360
            }
        );
        assert_eq!(rect.x + rect.width / 2, 640);
        assert_eq!(rect.y + rect.height / 2, 360);
    }

    #[test]
    fn test_crop_rounds_down() {
        let rect = crop_rect(1280, 720, ZoomFactor::new(3.0).unwrap());
        assert_eq!((rect.width, rect.height), (426, 240));
        assert_eq!((rect.x, rect.y), (427, 240));
    }

    #[test]
    fn test_unit_zoom_is_noop() {
        let rect = crop_rect(640, 480, ZoomFactor::NONE);
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 0, 640, 480));
    }

    #[test]
    fn test_zoom_keeps_centre_content() {
        // Mark the centre 640x360 region of a 1280x720 frame
        let frame = luma_frame(1280, 720, |x, y| {
            if (320..960).contains(&x) && (180..540).contains(&y) {
                200
            } else {
                10
            }
        });
        let out = transform(frame, &plain(2.0), FrameSize::new(640, 360)).unwrap();
        assert_eq!(out.size(), FrameSize::new(640, 360));
        assert!(out.image.pixels().all(|p| p.0 == [200, 200, 200]));
    }

    #[test]
    fn test_resize_to_destination() {
        let frame = luma_frame(64, 48, |_, _| 90);
        let out = transform(frame, &plain(1.0), FrameSize::new(320, 240)).unwrap();
        assert_eq!(out.size(), FrameSize::new(320, 240));
        assert_eq!(out.image.get_pixel(100, 100).0, [90, 90, 90]);
    }

    #[test]
    fn test_thermal_palette_applied() {
        let settings = ViewSettings {
            palette: PaletteMode::Inverted,
            ..ViewSettings::default()
        };
        let params = TransformParams::for_source(&settings, SourceKind::Thermal);
        let frame = luma_frame(4, 4, |_, _| 0);
        let out = transform(frame, &params, FrameSize::new(4, 4)).unwrap();
        assert!(out.image.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_thermal_ignores_visible_zoom() {
        let settings = ViewSettings {
            visible_zoom: ZoomFactor::new(4.0).unwrap(),
            ..ViewSettings::default()
        };
        let params = TransformParams::for_source(&settings, SourceKind::Thermal);
        assert!(!params.zoom.crops());
        let visible = TransformParams::for_source(&settings, SourceKind::Visible);
        assert!(visible.palette.is_none());
        assert!(visible.zoom.crops());
    }

    #[test]
    fn test_crosshair_sharp_after_downscale() {
        let params = TransformParams {
            crosshair: true,
            ..plain(1.0)
        };
        let frame = luma_frame(1280, 720, |_, _| 128);
        let out = transform(frame, &params, FrameSize::new(320, 240)).unwrap();

        let arm = crosshair_arm(320, 240);
        assert_eq!(arm, 12);
        let (cx, cy) = (160, 120);
        assert_eq!(*out.image.get_pixel(cx, cy), CROSSHAIR_COLOR);
        assert_eq!(*out.image.get_pixel(cx + arm, cy), CROSSHAIR_COLOR);
        assert_eq!(*out.image.get_pixel(cx - arm, cy - 1), CROSSHAIR_COLOR);
        assert_eq!(*out.image.get_pixel(cx, cy + arm), CROSSHAIR_COLOR);
        assert_eq!(*out.image.get_pixel(cx - 1, cy - arm), CROSSHAIR_COLOR);
        assert_eq!(out.image.get_pixel(cx + arm + 1, cy).0, [128, 128, 128]);
        assert_eq!(out.image.get_pixel(cx, cy + arm + 1).0, [128, 128, 128]);
        assert_eq!(out.image.get_pixel(10, 10).0, [128, 128, 128]);

        let exact = out.image.pixels().filter(|p| **p == CROSSHAIR_COLOR).count();
        assert_eq!(exact as u32, 2 * 2 * (2 * arm + 1) - 4);
    }

    #[test]
    fn test_bad_buffer_is_pipeline_error() {
        let frame = VideoFrame::new(10, 10, PixelLayout::Rgb8, vec![0; 10], 3);
        let err = transform(frame, &plain(1.0), FrameSize::new(10, 10)).unwrap_err();
        assert!(matches!(err, PipelineError::BufferSize { .. }));
    }

    #[test]
    fn test_empty_target_rejected() {
        let frame = luma_frame(4, 4, |_, _| 0);
        let err = transform(frame, &plain(1.0), FrameSize::new(0, 10)).unwrap_err();
        assert_eq!(err, PipelineError::EmptyTarget);
    }

    #[test]
    fn test_sequence_carried_through() {
        let mut frame = luma_frame(4, 4, |_, _| 0);
        frame.sequence = 42;
        let out = transform(frame, &plain(1.0), FrameSize::new(2, 2)).unwrap();
        assert_eq!(out.sequence, 42);
    }
}
