pub mod capture;
pub mod display;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod protocol;
pub mod serial;
pub mod session;
pub mod utils;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capture::{PixelLayout, SourceDescriptor};
use crate::display::{DisplayLayout, PresentationMode};
use crate::error::ConfigError;
use crate::pipeline::ViewSettings;
use crate::serial::SerialSettings;
use crate::session::RetryPolicy;

pub use payload::{Devices, ModeSwitch, Payload};

/// Environment variable prefix for overrides, e.g. `EOIR__SERIAL__THERMAL__PORT`
pub const ENV_PREFIX: &str = "EOIR";

/// System configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub video: VideoConfig,
    pub serial: SerialConfig,
    pub display: DisplayConfig,
    pub session: SessionConfig,
    pub presentation: PresentationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// GStreamer source element for the visible camera, or a device path
    pub visible: SourceDescriptor,
    pub thermal: SourceDescriptor,
    /// Upper bound on a single frame pull
    pub poll_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub thermal: SerialSettings,
    pub rangefinder: SerialSettings,
    /// Wait between writing a thermal command and reading its reply
    pub thermal_settle_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub layout: DisplayLayout,
    pub frame_queue_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub retry: RetryPolicy,
    pub idle_poll_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub mode: PresentationMode,
    pub view: ViewSettings,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            visible: SourceDescriptor::new("aravissrc", 1280, 720, PixelLayout::Luma8),
            thermal: SourceDescriptor::new("/dev/video0", 640, 512, PixelLayout::Luma8),
            poll_timeout_ms: 10,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            thermal: SerialSettings::default(),
            rangefinder: SerialSettings {
                port: "/dev/ttyUSB1".into(),
                ..SerialSettings::default()
            },
            thermal_settle_ms: 100,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            layout: DisplayLayout::default(),
            frame_queue_depth: 4,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            idle_poll_ms: 10,
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid by an optional TOML file, overlaid by `EOIR__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
