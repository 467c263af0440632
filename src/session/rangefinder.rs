use std::time::Duration;

use tracing::{debug, info, warn};

use super::Acquisition;
use crate::display::{DeliverySink, RoutingHandle};
use crate::error::SessionError;
use crate::protocol::rangefinder::{self, FrameAssembler, START_CONTINUOUS, STOP_MEASUREMENT};
use crate::serial::{SerialChannel, SerialConnector, SerialSettings};

const READ_CHUNK: usize = 64;

/// Continuous rangefinder measurement over a serial link
pub struct RangefinderAcquisition<C: SerialChannel> {
    channel: C,
    assembler: FrameAssembler,
    routing: RoutingHandle,
    sink: DeliverySink,
    read_timeout: Duration,
}

impl<C: SerialChannel> RangefinderAcquisition<C> {
    /// Open the port and put the rangefinder into continuous mode.
    pub fn open<S>(
        connector: &S,
        settings: &SerialSettings,
        routing: RoutingHandle,
        sink: DeliverySink,
    ) -> Result<Self, SessionError>
    where
        S: SerialConnector<Channel = C>,
    {
        let mut channel = connector.open(&settings.port, settings.baud)?;
        channel.write(&START_CONTINUOUS)?;
        info!("Rangefinder on {} measuring", settings.port);
        Ok(Self {
            channel,
            assembler: FrameAssembler::default(),
            routing,
            sink,
            read_timeout: settings.read_timeout(),
        })
    }

    fn send(&mut self, command: &[u8], what: &str) {
        if let Err(e) = self.channel.write(command) {
            warn!("Rangefinder {} command failed: {}", what, e);
        }
    }
}

impl<C: SerialChannel> Acquisition for RangefinderAcquisition<C> {
    fn cycle(&mut self) -> Result<(), SessionError> {
        let bytes = self.channel.read(READ_CHUNK, self.read_timeout)?;
        if bytes.is_empty() {
            return Ok(());
        }
        self.assembler.push(&bytes);

        while let Some(frame) = self.assembler.next_frame() {
            let sample = rangefinder::parse(&frame);
            let table = self.routing.load();
            debug!("{}", rangefinder::range_label(sample.as_ref()));
            self.sink
                .deliver_range_sample(sample, table.range_label, table.epoch);
        }

        let skipped = self.assembler.take_discarded();
        if skipped > 0 {
            debug!("Rangefinder resync dropped {} bytes", skipped);
            metrics::counter!("eoir_rangefinder_resync_bytes").increment(skipped);
        }
        Ok(())
    }

    fn on_pause(&mut self) {
        self.send(&STOP_MEASUREMENT, "stop");
    }

    fn on_resume(&mut self) {
        self.assembler.clear();
        self.send(&START_CONTINUOUS, "start");
    }

    fn on_stop(&mut self) {
        self.send(&STOP_MEASUREMENT, "stop");
    }
}
