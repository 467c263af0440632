//! Operating-system serial ports via the `serialport` crate

use std::io::{self, Read, Write};
use std::time::Duration;

use bytes::Bytes;
use serialport::SerialPort;
use tracing::info;

use super::{SerialChannel, SerialConnector};
use crate::error::SerialError;

#[derive(Debug, Clone, Default)]
pub struct SystemSerial;

impl SerialConnector for SystemSerial {
    type Channel = SystemPort;

    fn open(&self, port: &str, baud: u32) -> Result<SystemPort, SerialError> {
        let inner = serialport::new(port, baud)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| SerialError::Unavailable {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        info!("Serial port {} open @ {}", port, baud);
        Ok(SystemPort {
            name: port.to_string(),
            inner,
        })
    }
}

pub struct SystemPort {
    name: String,
    inner: Box<dyn SerialPort>,
}

impl SerialChannel for SystemPort {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.inner
            .write_all(bytes)
            .and_then(|_| self.inner.flush())
            .map_err(|e| SerialError::Write(e.to_string()))
    }

    fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes, SerialError> {
        self.inner
            .set_timeout(timeout)
            .map_err(|e| SerialError::TransientRead(e.to_string()))?;
        let mut buf = vec![0u8; max];
        match self.inner.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(Bytes::from(buf))
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Bytes::new()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe || e.kind() == io::ErrorKind::NotFound => {
                Err(SerialError::Disconnected(e.to_string()))
            }
            Err(e) => Err(SerialError::TransientRead(e.to_string())),
        }
    }
}

impl Drop for SystemPort {
    fn drop(&mut self) {
        info!("Serial port {} closed", self.name);
    }
}
