//! Payload controller
//!
//! Owns one [`StreamSession`] per role, the display router and the view
//! settings. Every operator action goes through here.

use std::time::Duration;

use tracing::{info, warn};

use crate::capture::VideoSource;
use crate::display::{DeliverySink, DisplayRouter, Presentation, PresentationMode, RoutingTable};
use crate::error::{CommandError, PipelineError, SessionError};
use crate::pipeline::{FrameSize, PaletteMode, SettingsStore, ViewSettings, ZoomFactor};
use crate::protocol::{FixedCommand, InfoRequest, ThermalFunction, ThermalRequest};
use crate::serial::SerialConnector;
use crate::session::rangefinder::RangefinderAcquisition;
use crate::session::thermal_link::{ThermalCommander, ThermalLinkAcquisition};
use crate::session::video::open_video;
use crate::session::{SessionRole, SessionState, SessionStats, StreamSession};
use crate::AppConfig;

/// Device backends used by the controller
pub struct Devices<V, T, S> {
    pub visible: V,
    pub thermal: T,
    pub serial: S,
}

/// Outcome of a presentation mode switch
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSwitch {
    pub mode: PresentationMode,
    pub started: Vec<SessionRole>,
    pub failed: Vec<(SessionRole, SessionError)>,
}

impl ModeSwitch {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Payload<V: VideoSource, T: VideoSource, S: SerialConnector> {
    config: AppConfig,
    devices: Devices<V, T, S>,
    settings: SettingsStore,
    router: DisplayRouter,
    sink: DeliverySink,
    visible: StreamSession,
    thermal: StreamSession,
    rangefinder: StreamSession,
    thermal_link: StreamSession,
    commander: Option<ThermalCommander>,
}

impl<V: VideoSource, T: VideoSource, S: SerialConnector> Payload<V, T, S> {
    /// Build the controller and the consumer end of its presentation queue.
    pub fn new(config: AppConfig, devices: Devices<V, T, S>) -> (Self, Presentation) {
        let router = DisplayRouter::new(config.display.layout);
        let (sink, presentation) =
            Presentation::channel(config.display.frame_queue_depth, router.handle());
        let idle = Duration::from_millis(config.session.idle_poll_ms);
        let session = |role| {
            StreamSession::new(role, sink.clone(), config.session.retry).with_idle_poll(idle)
        };

        let payload = Self {
            visible: session(SessionRole::Visible),
            thermal: session(SessionRole::Thermal),
            rangefinder: session(SessionRole::Rangefinder),
            thermal_link: session(SessionRole::ThermalLink),
            settings: SettingsStore::new(config.presentation.view),
            router,
            sink,
            devices,
            config,
            commander: None,
        };
        (payload, presentation)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn mode(&self) -> Option<PresentationMode> {
        self.router.mode()
    }

    pub fn routing(&self) -> std::sync::Arc<RoutingTable> {
        self.router.table()
    }

    pub fn state(&self, role: SessionRole) -> SessionState {
        self.session(role).state()
    }

    pub fn stats(&self, role: SessionRole) -> SessionStats {
        self.session(role).stats()
    }

    fn session(&self, role: SessionRole) -> &StreamSession {
        match role {
            SessionRole::Visible => &self.visible,
            SessionRole::Thermal => &self.thermal,
            SessionRole::Rangefinder => &self.rangefinder,
            SessionRole::ThermalLink => &self.thermal_link,
        }
    }

    fn session_mut(&mut self, role: SessionRole) -> &mut StreamSession {
        match role {
            SessionRole::Visible => &mut self.visible,
            SessionRole::Thermal => &mut self.thermal,
            SessionRole::Rangefinder => &mut self.rangefinder,
            SessionRole::ThermalLink => &mut self.thermal_link,
        }
    }

    // Stream control

    pub fn start(&mut self, role: SessionRole) -> Result<(), SessionError> {
        let routing = self.router.handle();
        let sink = self.sink.clone();
        let settings = self.settings.clone();
        let poll = Duration::from_millis(self.config.video.poll_timeout_ms);

        match role {
            SessionRole::Visible => {
                let (source, desc) = (&self.devices.visible, &self.config.video.visible);
                self.visible
                    .start(|| open_video(source, desc, role, settings, routing, sink, poll))
            }
            SessionRole::Thermal => {
                let (source, desc) = (&self.devices.thermal, &self.config.video.thermal);
                self.thermal
                    .start(|| open_video(source, desc, role, settings, routing, sink, poll))
            }
            SessionRole::Rangefinder => {
                let (serial, port) = (&self.devices.serial, &self.config.serial.rangefinder);
                self.rangefinder
                    .start(|| RangefinderAcquisition::open(serial, port, routing, sink))
            }
            SessionRole::ThermalLink => self.connect_thermal_link(),
        }
    }

    pub fn stop(&mut self, role: SessionRole) -> Result<(), SessionError> {
        if role == SessionRole::ThermalLink {
            self.commander = None;
        }
        self.session_mut(role).stop()
    }

    pub fn pause(&self, role: SessionRole) -> Result<(), SessionError> {
        self.session(role).pause()
    }

    pub fn resume(&self, role: SessionRole) -> Result<(), SessionError> {
        self.session(role).resume()
    }

    /// Switch presentation mode.
    ///
    /// Targets are released and every display session is stopped (and its
    /// device released) before the new targets are sized; only then are the
    /// sessions the new mode needs started. A session that fails to open is
    /// reported in the result and does not stop the others.
    pub fn switch_mode(&mut self, mode: PresentationMode) -> ModeSwitch {
        info!("Switching presentation to {:?}", mode);
        self.router.release();
        for role in [SessionRole::Visible, SessionRole::Thermal, SessionRole::Rangefinder] {
            if let Err(e) = self.session_mut(role).stop() {
                warn!("{} stop during mode switch: {}", role, e);
            }
        }

        self.router.apply(mode);

        let mut report = ModeSwitch {
            mode,
            started: Vec::new(),
            failed: Vec::new(),
        };
        for &role in mode.required_roles() {
            match self.start(role) {
                Ok(()) => report.started.push(role),
                Err(e) => {
                    warn!("{} unavailable in {:?}: {}", role, mode, e);
                    report.failed.push((role, e));
                }
            }
        }
        report
    }

    /// Leave the current mode: release targets and stop display sessions.
    pub fn clear_mode(&mut self) {
        self.router.release();
        for role in [SessionRole::Visible, SessionRole::Thermal, SessionRole::Rangefinder] {
            let _ = self.session_mut(role).stop();
        }
    }

    /// Main pane resized. Running sessions pick up the new size on their next frame.
    pub fn resize_pane(&mut self, pane: FrameSize) {
        self.router.resize_pane(pane);
    }

    /// Stop every session, including the thermal link.
    pub fn shutdown(&mut self) {
        info!("Payload shutting down");
        self.router.release();
        self.commander = None;
        for role in SessionRole::ALL {
            let _ = self.session_mut(role).stop();
        }
    }

    // Thermal link

    pub fn connect_thermal_link(&mut self) -> Result<(), SessionError> {
        let serial = &self.devices.serial;
        let port = &self.config.serial.thermal;
        let settle = Duration::from_millis(self.config.serial.thermal_settle_ms);
        let sink = self.sink.clone();

        let mut commander = None;
        self.thermal_link.start(|| {
            let (acq, cmd) = ThermalLinkAcquisition::open(serial, port, settle, sink)?;
            commander = Some(cmd);
            Ok(acq)
        })?;
        self.commander = commander;
        Ok(())
    }

    pub fn thermal_link_connected(&self) -> bool {
        self.commander.as_ref().is_some_and(|c| c.is_connected())
            && self.thermal_link.state() == SessionState::Playing
    }

    /// Validate, encode and queue a thermal command.
    pub fn send_thermal(&self, request: &ThermalRequest) -> Result<(), CommandError> {
        if self.thermal_link.state() != SessionState::Playing {
            // still validate so range errors surface first
            request.encode()?;
            return Err(CommandError::LinkDown);
        }
        match &self.commander {
            Some(c) => c.submit(request),
            None => {
                request.encode()?;
                Err(CommandError::LinkDown)
            }
        }
    }

    pub fn set_thermal_parameter(
        &self,
        function: ThermalFunction,
        value: i64,
    ) -> Result<(), CommandError> {
        self.send_thermal(&ThermalRequest::Parameter { function, value })
    }

    /// Camera-side zoom of the thermal core
    pub fn set_thermal_zoom(&self, level: i64) -> Result<(), CommandError> {
        self.set_thermal_parameter(ThermalFunction::Zoom, level)
    }

    pub fn set_hotspot(&self, on: bool) -> Result<(), CommandError> {
        let cmd = if on {
            FixedCommand::HotspotOn
        } else {
            FixedCommand::HotspotOff
        };
        self.send_thermal(&ThermalRequest::Fixed(cmd))
    }

    /// Queue every identification query.
    pub fn read_thermal_info(&self) -> Result<(), CommandError> {
        for info in InfoRequest::ALL {
            self.send_thermal(&ThermalRequest::Info(info))?;
        }
        Ok(())
    }

    // View settings

    pub fn view(&self) -> ViewSettings {
        *self.settings.snapshot()
    }

    pub fn set_visible_zoom(&self, factor: f32) -> Result<ZoomFactor, PipelineError> {
        let zoom = ZoomFactor::new(factor)?;
        self.settings.update(|s| ViewSettings {
            visible_zoom: zoom,
            ..*s
        });
        Ok(zoom)
    }

    /// Change the thermal display palette; mirrored to the camera when the link is up.
    pub fn set_palette(&self, palette: PaletteMode) {
        self.settings.update(|s| ViewSettings { palette, ..*s });
        if self.thermal_link_connected() {
            let cmd = ThermalRequest::Fixed(FixedCommand::Palette(palette.camera_palette()));
            if let Err(e) = self.send_thermal(&cmd) {
                warn!("Palette not mirrored to camera: {}", e);
            }
        }
    }

    pub fn toggle_crosshair(&self) -> bool {
        self.settings
            .update(|s| ViewSettings {
                crosshair: !s.crosshair,
                ..*s
            })
            .crosshair
    }
}

impl<V: VideoSource, T: VideoSource, S: SerialConnector> Drop for Payload<V, T, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
