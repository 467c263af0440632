//! Thermal camera control link
//!
//! Commands are queued by the controller and executed one at a time by the
//! link worker: write, wait for the camera to settle, read the expected
//! response length, validate. A bad reply is reported, not fatal.

use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::Acquisition;
use crate::display::DeliverySink;
use crate::error::{CommandError, ProtocolError, SerialError, SessionError};
use crate::protocol::thermal::{to_hex_string, NO_RESPONSE};
use crate::protocol::{decode_response, EncodedCommand, ThermalRequest, ThermalResponse};
use crate::serial::{read_exact_within, SerialChannel, SerialConnector, SerialSettings};
use crate::session::{SessionRole, SessionState};

const QUEUE_DEPTH: usize = 32;
const QUEUE_POLL: Duration = Duration::from_millis(50);

/// Queues thermal commands for the link worker
#[derive(Clone)]
pub struct ThermalCommander {
    tx: Sender<EncodedCommand>,
}

impl ThermalCommander {
    /// Encode and queue. Out-of-range values fail here, before any byte is sent.
    pub fn submit(&self, request: &ThermalRequest) -> Result<(), CommandError> {
        let encoded = request.encode()?;
        match self.tx.try_send(encoded) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(CommandError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(CommandError::LinkDown),
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.tx.is_disconnected()
    }
}

pub struct ThermalLinkAcquisition<C: SerialChannel> {
    channel: C,
    requests: Receiver<EncodedCommand>,
    sink: DeliverySink,
    settle: Duration,
    read_timeout: Duration,
}

impl<C: SerialChannel> ThermalLinkAcquisition<C> {
    /// Open the control port. Returns the worker half and a commander for it.
    pub fn open<S>(
        connector: &S,
        settings: &SerialSettings,
        settle: Duration,
        sink: DeliverySink,
    ) -> Result<(Self, ThermalCommander), SessionError>
    where
        S: SerialConnector<Channel = C>,
    {
        let channel = connector.open(&settings.port, settings.baud)?;
        let (tx, rx) = flume::bounded(QUEUE_DEPTH);
        info!("Thermal link on {} @ {} baud", settings.port, settings.baud);
        Ok((
            Self {
                channel,
                requests: rx,
                sink,
                settle,
                read_timeout: settings.read_timeout(),
            },
            ThermalCommander { tx },
        ))
    }

    fn execute(&mut self, command: EncodedCommand) -> Result<(), SessionError> {
        debug!("TX {} {}", command.label, to_hex_string(&command.bytes));
        self.channel.write(&command.bytes)?;
        std::thread::sleep(self.settle);

        let raw = match read_exact_within(&mut self.channel, command.response_len, self.read_timeout) {
            Ok(raw) => raw,
            Err(SerialError::TransientRead(msg)) => {
                self.reply(&command.label, Err(ProtocolError::Truncated { len: 0 }));
                return Err(SessionError::TransientRead(msg));
            }
            Err(e) => return Err(e.into()),
        };
        debug!("RX {}", to_hex_string(&raw));

        let outcome = decode_response(&raw, command.response_len);
        self.reply(&command.label, outcome);
        Ok(())
    }

    fn reply(&self, label: &str, outcome: Result<ThermalResponse, ProtocolError>) {
        let line = match &outcome {
            Ok(resp) => format!("{} {}", label, resp.payload_hex_le()),
            Err(e) => {
                warn!("{} discarded: {}", label, e);
                metrics::counter!("eoir_protocol_discarded").increment(1);
                format!("{} {}", label, NO_RESPONSE)
            }
        };
        self.sink
            .report_status(SessionRole::ThermalLink, SessionState::Playing, line);
        self.sink.thermal_reply(label, outcome);
    }
}

impl<C: SerialChannel> Acquisition for ThermalLinkAcquisition<C> {
    fn cycle(&mut self) -> Result<(), SessionError> {
        match self.requests.recv_timeout(QUEUE_POLL) {
            Ok(command) => self.execute(command),
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(QUEUE_POLL);
                Ok(())
            }
        }
    }
}
