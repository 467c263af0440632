//! Error types for every layer of the payload core.

use thiserror::Error;

use crate::session::{SessionRole, SessionState};

/// Video device errors reported by a [`VideoSource`](crate::capture::VideoSource) or its stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not be opened
    #[error("device {descriptor} unavailable: {reason}")]
    Unavailable { descriptor: String, reason: String },

    /// A single pull failed but the device is still usable
    #[error("transient read error: {0}")]
    Transient(String),

    /// The device went away while streaming
    #[error("device disconnected: {0}")]
    Disconnected(String),
}

/// Serial link errors reported by a [`SerialChannel`](crate::serial::SerialChannel).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerialError {
    #[error("serial port {port} unavailable: {reason}")]
    Unavailable { port: String, reason: String },

    /// Hiccup on the line; retried with backoff
    #[error("transient serial read error: {0}")]
    TransientRead(String),

    #[error("serial write failed: {0}")]
    Write(String),

    #[error("serial port disconnected: {0}")]
    Disconnected(String),
}

/// Malformed or rejected protocol bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than the smallest valid frame
    #[error("truncated frame: {len} bytes")]
    Truncated { len: usize },

    #[error("checksum mismatch: received {received:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { received: u16, computed: u16 },

    /// Parameter rejected before any byte was produced
    #[error("{function} must be between {min} and {max}, got {value}")]
    OutOfRange {
        function: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid hex command: {0}")]
    InvalidHex(String),
}

/// Frame transform failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("frame buffer holds {actual} bytes, layout needs {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("frame has zero width or height")]
    EmptyFrame,

    #[error("display target has zero width or height")]
    EmptyTarget,

    #[error("zoom factor {0} outside [1.0, 4.0]")]
    InvalidZoom(f32),

    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// Session lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A session for this role is already Opening, Playing or Paused
    #[error("{0} session already running")]
    AlreadyRunning(SessionRole),

    #[error("{role}: cannot {op} while {from}")]
    InvalidTransition {
        role: SessionRole,
        from: SessionState,
        op: &'static str,
    },

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("transient read error: {0}")]
    TransientRead(String),

    #[error("device disconnected: {0}")]
    Disconnected(String),

    #[error("pipeline failure: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

impl SessionError {
    /// Transient errors are retried by the worker loop; everything else fails the session.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::TransientRead(_))
    }
}

impl From<DeviceError> for SessionError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Unavailable { .. } => SessionError::DeviceUnavailable(err.to_string()),
            DeviceError::Transient(msg) => SessionError::TransientRead(msg),
            DeviceError::Disconnected(msg) => SessionError::Disconnected(msg),
        }
    }
}

impl From<SerialError> for SessionError {
    fn from(err: SerialError) -> Self {
        match err {
            SerialError::Unavailable { .. } => SessionError::DeviceUnavailable(err.to_string()),
            SerialError::TransientRead(msg) => SessionError::TransientRead(msg),
            SerialError::Write(msg) | SerialError::Disconnected(msg) => {
                SessionError::Disconnected(msg)
            }
        }
    }
}

/// A thermal command that never reached the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("thermal link is not connected")]
    LinkDown,

    #[error("thermal command queue full")]
    QueueFull,
}

/// Configuration loading failure.
#[derive(Error, Debug)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[from] pub config::ConfigError);
