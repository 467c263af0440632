use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{Acquisition, SessionRole};
use crate::capture::{SourceDescriptor, VideoSource, VideoStream};
use crate::display::{DeliverySink, RoutingHandle};
use crate::error::SessionError;
use crate::pipeline::{transform, SettingsStore, SourceKind, TransformParams};

/// Pulls frames from a camera, transforms them for the current route and delivers them
pub struct VideoAcquisition<S: VideoStream> {
    role: SessionRole,
    kind: SourceKind,
    stream: S,
    settings: SettingsStore,
    routing: RoutingHandle,
    sink: DeliverySink,
    poll_timeout: Duration,
}

impl<S: VideoStream> VideoAcquisition<S> {
    pub fn new(
        role: SessionRole,
        stream: S,
        settings: SettingsStore,
        routing: RoutingHandle,
        sink: DeliverySink,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            role,
            kind: role.source_kind().unwrap_or(SourceKind::Visible),
            stream,
            settings,
            routing,
            sink,
            poll_timeout,
        }
    }
}

/// Open `source` for `role`. The returned acquisition owns the stream handle.
pub fn open_video<V: VideoSource>(
    source: &V,
    descriptor: &SourceDescriptor,
    role: SessionRole,
    settings: SettingsStore,
    routing: RoutingHandle,
    sink: DeliverySink,
    poll_timeout: Duration,
) -> Result<VideoAcquisition<V::Stream>, SessionError> {
    debug!("Opening {} source {}", role, descriptor.device);
    let stream = source.open(descriptor)?;
    Ok(VideoAcquisition::new(
        role,
        stream,
        settings,
        routing,
        sink,
        poll_timeout,
    ))
}

impl<S: VideoStream> Acquisition for VideoAcquisition<S> {
    fn cycle(&mut self) -> Result<(), SessionError> {
        let Some(frame) = self.stream.pull(self.poll_timeout)? else {
            return Ok(());
        };

        let table = self.routing.load();
        let Some(route) = table.route(self.role) else {
            trace!("{} frame {} has no target", self.role, frame.sequence);
            return Ok(());
        };

        let settings = self.settings.snapshot();
        let params = TransformParams::for_source(&settings, self.kind);

        let started = Instant::now();
        let out = transform(frame, &params, route.size)?;
        metrics::histogram!("eoir_transform_time_us", "role" => self.role.as_str())
            .record(started.elapsed().as_micros() as f64);

        self.sink
            .deliver_frame(self.role, route.target, table.epoch, out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{PixelLayout, SyntheticSource};
    use crate::display::{DisplayLayout, DisplayRouter, Presentation, PresentationMode, TargetId};
    use crate::pipeline::FrameSize;

    #[test]
    fn test_frames_sized_for_route() {
        let mut router = DisplayRouter::new(DisplayLayout::default());
        router.apply(PresentationMode::VisibleWithThermalOverlay);
        let (sink, presentation) = Presentation::channel(4, router.handle());
        let descriptor = SourceDescriptor::new("test", 64, 48, PixelLayout::Luma8);
        let mut acq = open_video(
            &SyntheticSource,
            &descriptor,
            SessionRole::Thermal,
            SettingsStore::default(),
            router.handle(),
            sink,
            Duration::from_millis(200),
        )
        .unwrap();

        acq.cycle().unwrap();
        let d = presentation.try_frame().unwrap();
        assert_eq!(d.target, TargetId::OverlayPane);
        assert_eq!(d.frame.size(), FrameSize::new(320, 240));
    }

    #[test]
    fn test_unrouted_role_delivers_nothing() {
        let mut router = DisplayRouter::new(DisplayLayout::default());
        router.apply(PresentationMode::SingleThermal);
        let (sink, presentation) = Presentation::channel(4, router.handle());
        let descriptor = SourceDescriptor::new("test", 32, 32, PixelLayout::Rgb8);
        let mut acq = open_video(
            &SyntheticSource,
            &descriptor,
            SessionRole::Visible,
            SettingsStore::default(),
            router.handle(),
            sink,
            Duration::from_millis(200),
        )
        .unwrap();
        acq.cycle().unwrap();
        assert!(presentation.try_frame().is_none());
    }
}
