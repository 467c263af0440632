//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod mock_helpers;

use std::thread;
use std::time::{Duration, Instant};

use eoir::capture::{PixelLayout, SourceDescriptor};
use eoir::display::{DisplayLayout, PresentationEvent};
use eoir::pipeline::FrameSize;
use eoir::session::RetryPolicy;
use eoir::AppConfig;

pub use mock_helpers::{CountingSource, ScriptedSerial, SerialLine};

pub const RANGEFINDER_PORT: &str = "/dev/ttyRF";
pub const THERMAL_PORT: &str = "/dev/ttyIR";

/// Small frames and panes so tests don't spend their time resizing
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.video.visible = SourceDescriptor::new("visible", 64, 48, PixelLayout::Rgb8);
    config.video.thermal = SourceDescriptor::new("thermal", 40, 32, PixelLayout::Luma8);
    config.video.poll_timeout_ms = 20;
    config.display.layout = DisplayLayout {
        pane: FrameSize::new(160, 120),
        overlay: FrameSize::new(40, 30),
        overlay_margin: 4,
        label_gap: 2,
        label_height: 8,
    };
    config.display.frame_queue_depth = 8;
    config.serial.thermal.port = THERMAL_PORT.into();
    config.serial.thermal.read_timeout_ms = 100;
    config.serial.rangefinder.port = RANGEFINDER_PORT.into();
    config.serial.rangefinder.read_timeout_ms = 20;
    config.serial.thermal_settle_ms = 1;
    config.session.retry = RetryPolicy {
        initial_ms: 1,
        max_ms: 10,
    };
    config.session.idle_poll_ms = 2;
    config
}

/// Poll `cond` until it holds or two seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Status messages in `events`, rendered as `"role state: message"`
pub fn status_lines(events: &[PresentationEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PresentationEvent::Status {
                role,
                state,
                message,
            } => Some(format!("{} {}: {}", role, state, message)),
            _ => None,
        })
        .collect()
}
