//! Byte-level serial capability
//!
//! Both protocol links (thermal UART and rangefinder) talk through these
//! traits. A [`SerialChannel`] is the open port handle: it is owned by exactly
//! one session worker and the port closes when it is dropped.

#[cfg(feature = "serial")]
pub mod port;

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::SerialError;

#[cfg(feature = "serial")]
pub use port::SystemSerial;

/// Opens serial ports
pub trait SerialConnector: Send + Sync + 'static {
    type Channel: SerialChannel;

    fn open(&self, port: &str, baud: u32) -> Result<Self::Channel, SerialError>;
}

/// An open serial port
pub trait SerialChannel: Send + 'static {
    /// Write all of `bytes`
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// Read up to `max` bytes, waiting at most `timeout`.
    ///
    /// May return fewer bytes than requested, including none on timeout.
    fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes, SerialError>;
}

/// Connector for builds without serial support; every open fails.
#[derive(Debug, Clone, Default)]
pub struct NoSerial;

/// Never constructed
#[derive(Debug)]
pub enum NoChannel {}

impl SerialConnector for NoSerial {
    type Channel = NoChannel;

    fn open(&self, port: &str, _baud: u32) -> Result<NoChannel, SerialError> {
        Err(SerialError::Unavailable {
            port: port.to_string(),
            reason: "built without serial support".into(),
        })
    }
}

impl SerialChannel for NoChannel {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), SerialError> {
        match *self {}
    }

    fn read(&mut self, _max: usize, _timeout: Duration) -> Result<Bytes, SerialError> {
        match *self {}
    }
}

/// Port settings for one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    pub read_timeout_ms: u64,
}

impl SerialSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud: 115200,
            read_timeout_ms: 1000,
        }
    }
}

/// Keep reading until `len` bytes arrived or `timeout` elapsed.
///
/// Returns whatever was collected; a short result is the caller's problem.
pub fn read_exact_within<C: SerialChannel + ?Sized>(
    channel: &mut C,
    len: usize,
    timeout: Duration,
) -> Result<Bytes, SerialError> {
    let deadline = Instant::now() + timeout;
    let mut buf = BytesMut::with_capacity(len);
    while buf.len() < len {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let chunk = channel.read(len - buf.len(), deadline - now)?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
