//! Device discovery helpers

use serde::{Deserialize, Serialize};

use crate::capture::{PixelLayout, WireFormat};

/// A detected capture device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundDevice {
    pub path: String,
    pub card: String,
    pub format: WireFormat,
}

impl FoundDevice {
    /// Layout the device's preferred format decodes to
    pub fn layout(&self) -> PixelLayout {
        match self.format {
            WireFormat::Gray8 | WireFormat::Yuyv4 => PixelLayout::Luma8,
            WireFormat::Rgb24 | WireFormat::Bgr24 | WireFormat::Mjpeg => PixelLayout::Rgb8,
        }
    }
}

/// Scan `/dev/video0..9` for capture devices, YUYV (thermal cores) preferred over MJPEG.
#[cfg(feature = "v4l2")]
pub fn detect_video_devices() -> Vec<FoundDevice> {
    use std::path::Path;

    use tracing::{debug, info};
    use v4l::{capability::Flags, video::Capture, Device, FourCC};

    info!("Scanning for capture devices...");
    let mut found = Vec::new();

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }
        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            debug!("{} is not a capture device", path);
            continue;
        }
        let Ok(formats) = dev.enum_formats() else {
            continue;
        };

        let fourccs: Vec<FourCC> = formats.iter().map(|f| f.fourcc).collect();
        let format = if fourccs.contains(&FourCC::new(b"YUYV")) {
            WireFormat::Yuyv4
        } else if fourccs.contains(&FourCC::new(b"GREY")) {
            WireFormat::Gray8
        } else if fourccs.contains(&FourCC::new(b"MJPG")) {
            WireFormat::Mjpeg
        } else {
            continue;
        };

        info!("Found {:?} device: {} - {}", format, path, caps.card);
        found.push(FoundDevice {
            path,
            card: caps.card,
            format,
        });
    }
    found
}

/// Serial ports present on the system
#[cfg(feature = "serial")]
pub fn list_serial_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("Serial port enumeration failed: {}", e);
            Vec::new()
        }
    }
}
