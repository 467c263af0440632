//! EO/IR payload runner
//!
//! Starts the configured presentation mode and logs everything the
//! presentation queue produces until Ctrl-C.

use std::path::PathBuf;

use color_eyre::Result;
use tracing::{debug, info, warn};

use eoir::display::{PresentationEvent, Presented};
use eoir::protocol::rangefinder::range_label;
use eoir::protocol::thermal::NO_RESPONSE;
use eoir::{AppConfig, Devices, Payload};

#[cfg(feature = "gstreamer-pipeline")]
type VisibleSource = eoir::capture::GstSource;
#[cfg(not(feature = "gstreamer-pipeline"))]
type VisibleSource = eoir::capture::SyntheticSource;

#[cfg(feature = "v4l2")]
type ThermalSource = eoir::capture::V4l2Source;
#[cfg(not(feature = "v4l2"))]
type ThermalSource = eoir::capture::SyntheticSource;

#[cfg(feature = "serial")]
type Serial = eoir::serial::SystemSerial;
#[cfg(not(feature = "serial"))]
type Serial = eoir::serial::NoSerial;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("eoir=debug")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("EO/IR payload launching...");

    let path = std::env::var_os("EOIR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("eoir.toml"));
    let config = AppConfig::load(Some(path.as_path()))?;
    debug!("Configuration: {:?}", config);

    #[cfg(feature = "v4l2")]
    for dev in eoir::utils::detect_video_devices() {
        info!("Capture device {} ({}) {:?}", dev.path, dev.card, dev.format);
    }
    #[cfg(feature = "serial")]
    info!("Serial ports: {:?}", eoir::utils::list_serial_ports());

    let mode = config.presentation.mode;
    let devices = Devices {
        visible: VisibleSource::default(),
        thermal: ThermalSource::default(),
        serial: Serial::default(),
    };
    let (mut payload, presentation) = Payload::new(config, devices);

    match payload.connect_thermal_link() {
        Ok(()) => {
            if let Err(e) = payload.read_thermal_info() {
                warn!("Thermal info request failed: {}", e);
            }
        }
        Err(e) => warn!("Thermal link unavailable: {}", e),
    }

    let switch = payload.switch_mode(mode);
    info!("Mode {:?} started {:?}", switch.mode, switch.started);
    for (role, err) in &switch.failed {
        warn!("{} not started: {}", role, err);
    }

    let mut frames: u64 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            item = presentation.next() => match item {
                Some(Presented::Frame(d)) => {
                    frames += 1;
                    if frames % 300 == 0 {
                        debug!("{} frames presented, last {} -> {:?}", frames, d.role, d.target);
                    }
                }
                Some(Presented::Event(PresentationEvent::Status { role, state, message })) => {
                    info!("[{}] {}: {}", role, state, message);
                }
                Some(Presented::Event(PresentationEvent::Range { sample, .. })) => {
                    debug!("{}", range_label(sample.as_ref()));
                }
                Some(Presented::Event(PresentationEvent::ThermalReply { label, outcome })) => {
                    match outcome {
                        Ok(resp) => debug!("reply {} {}", label, resp.payload_hex_le()),
                        Err(_) => debug!("reply {} {}", label, NO_RESPONSE),
                    }
                }
                None => break,
            }
        }
    }

    payload.shutdown();
    info!("EO/IR payload shut down");
    Ok(())
}
