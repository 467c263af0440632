//! Thermal camera UART protocol
//!
//! Every frame, in both directions, has the same 8-byte head:
//!
//! ```text
//! 0      1      2        3    4    5    6        7        8..
//! 0x68   group  len      01   00   00   sum lo   sum hi   payload[len]
//! ```
//!
//! The checksum is the 16-bit sum of every other byte in the frame. For the
//! parameterized image commands the fixed bytes sum to the function's opcode,
//! so the checksum reduces to `opcode + value`.

use std::fmt::Write as _;

use bytes::Bytes;

use crate::error::ProtocolError;

/// Smallest valid frame: the head with an empty payload
pub const FRAME_HEAD_LEN: usize = 8;
const LENGTH_OFFSET: usize = 2;
const CHECKSUM_LO: usize = 6;
const CHECKSUM_HI: usize = 7;

const PARAM_HEAD: [u8; 6] = [0x68, 0x24, 0x04, 0x01, 0x00, 0x00];
const PARAM_RESPONSE_LEN: usize = 12;
const RAW_RESPONSE_LEN: usize = 16;

/// Rendered in place of a payload when the camera gave nothing usable
pub const NO_RESPONSE: &str = "(no/invalid response)";

/// Image settings that take a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThermalFunction {
    Brightness,
    Contrast,
    Denoise,
    VerticalStripe,
    Zoom,
}

/// Static description of a parameterized function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub opcode: u8,
    /// Group and selector bytes that precede the value
    pub selector: [u8; 2],
    pub min: u8,
    pub max: u8,
}

impl ThermalFunction {
    pub const ALL: [ThermalFunction; 5] = [
        ThermalFunction::Brightness,
        ThermalFunction::Contrast,
        ThermalFunction::Denoise,
        ThermalFunction::VerticalStripe,
        ThermalFunction::Zoom,
    ];

    pub const fn descriptor(self) -> FunctionDescriptor {
        match self {
            ThermalFunction::Brightness => FunctionDescriptor {
                name: "brightness",
                opcode: 0x93,
                selector: [0x02, 0x00],
                min: 10,
                max: 250,
            },
            ThermalFunction::Contrast => FunctionDescriptor {
                name: "contrast",
                opcode: 0x94,
                selector: [0x02, 0x01],
                min: 10,
                max: 250,
            },
            ThermalFunction::Denoise => FunctionDescriptor {
                name: "denoise",
                opcode: 0x98,
                selector: [0x02, 0x05],
                min: 0,
                max: 15,
            },
            ThermalFunction::VerticalStripe => FunctionDescriptor {
                name: "vertical-stripe",
                opcode: 0x9A,
                selector: [0x02, 0x07],
                min: 0,
                max: 1,
            },
            ThermalFunction::Zoom => FunctionDescriptor {
                name: "zoom",
                opcode: 0x96,
                selector: [0x04, 0x01],
                min: 1,
                max: 16,
            },
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn opcode(self) -> u8 {
        self.descriptor().opcode
    }

    /// Check `value` against the inclusive range for this function.
    pub fn validate(self, value: i64) -> Result<u8, ProtocolError> {
        let d = self.descriptor();
        if value < d.min as i64 || value > d.max as i64 {
            return Err(ProtocolError::OutOfRange {
                function: d.name,
                value,
                min: d.min as i64,
                max: d.max as i64,
            });
        }
        Ok(value as u8)
    }
}

/// Pseudo-colour palettes built into the camera core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraPalette {
    Rainbow,
    Green,
    Metal,
    White,
    Black,
}

/// Commands without parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedCommand {
    Palette(CameraPalette),
    SavePalette,
    HotspotOn,
    HotspotOff,
}

impl FixedCommand {
    pub fn bytes(self) -> &'static [u8] {
        match self {
            FixedCommand::Palette(CameraPalette::Rainbow) => {
                &[0x68, 0x11, 0x03, 0x01, 0x00, 0x00, 0x80, 0x00, 0x02, 0x01, 0x00]
            }
            FixedCommand::Palette(CameraPalette::Green) => {
                &[0x68, 0x11, 0x03, 0x01, 0x00, 0x00, 0x81, 0x00, 0x02, 0x01, 0x01]
            }
            FixedCommand::Palette(CameraPalette::Metal) => {
                &[0x68, 0x11, 0x03, 0x01, 0x00, 0x00, 0x82, 0x00, 0x02, 0x01, 0x02]
            }
            FixedCommand::Palette(CameraPalette::White) => {
                &[0x68, 0x11, 0x03, 0x01, 0x00, 0x00, 0x83, 0x00, 0x02, 0x01, 0x03]
            }
            FixedCommand::Palette(CameraPalette::Black) => {
                &[0x68, 0x11, 0x03, 0x01, 0x00, 0x00, 0x84, 0x00, 0x02, 0x01, 0x04]
            }
            FixedCommand::SavePalette => &[0x68, 0x11, 0x01, 0x01, 0x00, 0x00, 0x7E, 0x00, 0x03],
            FixedCommand::HotspotOn => {
                &[0x68, 0x10, 0x03, 0x01, 0x00, 0x00, 0x80, 0x00, 0x02, 0x01, 0x01]
            }
            FixedCommand::HotspotOff => {
                &[0x68, 0x10, 0x03, 0x01, 0x00, 0x00, 0x7F, 0x00, 0x02, 0x01, 0x00]
            }
        }
    }

    pub fn response_len(self) -> usize {
        match self {
            FixedCommand::Palette(_) | FixedCommand::SavePalette => 10,
            FixedCommand::HotspotOn | FixedCommand::HotspotOff => 12,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FixedCommand::Palette(CameraPalette::Rainbow) => "Palette rainbow:",
            FixedCommand::Palette(CameraPalette::Green) => "Palette green:",
            FixedCommand::Palette(CameraPalette::Metal) => "Palette metal:",
            FixedCommand::Palette(CameraPalette::White) => "Palette white:",
            FixedCommand::Palette(CameraPalette::Black) => "Palette black:",
            FixedCommand::SavePalette => "Palette save:",
            FixedCommand::HotspotOn => "Hotspot on:",
            FixedCommand::HotspotOff => "Hotspot off:",
        }
    }
}

/// Read-only identification queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoRequest {
    ChipModel,
    ChipId,
    FirmwareVersion,
    HardwareVersion,
}

impl InfoRequest {
    pub const ALL: [InfoRequest; 4] = [
        InfoRequest::ChipModel,
        InfoRequest::ChipId,
        InfoRequest::FirmwareVersion,
        InfoRequest::HardwareVersion,
    ];

    pub fn bytes(self) -> &'static [u8] {
        match self {
            InfoRequest::ChipModel => &[0x68, 0x01, 0x00, 0x01, 0x00, 0x00, 0x6A, 0x00],
            InfoRequest::ChipId => &[0x68, 0x35, 0x00, 0x01, 0x00, 0x00, 0x9E, 0x00],
            InfoRequest::FirmwareVersion => {
                &[0x68, 0x10, 0x02, 0x01, 0x00, 0x00, 0x7C, 0x00, 0x01, 0x00]
            }
            InfoRequest::HardwareVersion => {
                &[0x68, 0x10, 0x02, 0x01, 0x00, 0x00, 0x7D, 0x00, 0x01, 0x01]
            }
        }
    }

    pub fn response_len(self) -> usize {
        match self {
            InfoRequest::ChipModel => 10,
            InfoRequest::ChipId => 16,
            InfoRequest::FirmwareVersion | InfoRequest::HardwareVersion => 12,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InfoRequest::ChipModel => "Chip model:",
            InfoRequest::ChipId => "Chip ID:",
            InfoRequest::FirmwareVersion => "Firmware ver:",
            InfoRequest::HardwareVersion => "Hardware ver:",
        }
    }
}

/// Anything that can be sent over the thermal link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThermalRequest {
    Fixed(FixedCommand),
    Parameter { function: ThermalFunction, value: i64 },
    Info(InfoRequest),
    /// Operator-entered bytes, sent as-is
    Raw(Bytes),
}

/// A request turned into wire bytes, with how much to read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    pub bytes: Bytes,
    pub response_len: usize,
    pub label: String,
}

impl ThermalRequest {
    pub fn encode(&self) -> Result<EncodedCommand, ProtocolError> {
        let encoded = match self {
            ThermalRequest::Fixed(cmd) => EncodedCommand {
                bytes: encode_fixed(*cmd),
                response_len: cmd.response_len(),
                label: cmd.label().to_string(),
            },
            ThermalRequest::Parameter { function, value } => EncodedCommand {
                bytes: encode_parameterized(*function, *value)?,
                response_len: PARAM_RESPONSE_LEN,
                label: format!("{} {}:", function.name(), value),
            },
            ThermalRequest::Info(info) => EncodedCommand {
                bytes: Bytes::from_static(info.bytes()),
                response_len: info.response_len(),
                label: info.label().to_string(),
            },
            ThermalRequest::Raw(bytes) => EncodedCommand {
                bytes: bytes.clone(),
                response_len: RAW_RESPONSE_LEN,
                label: "Custom:".to_string(),
            },
        };
        Ok(encoded)
    }
}

pub fn encode_fixed(command: FixedCommand) -> Bytes {
    Bytes::from_static(command.bytes())
}

/// Checksum bytes for a parameterized command, low byte first.
pub fn sumcheck(opcode: u8, value: u8) -> [u8; 2] {
    let sum = (opcode as u16).wrapping_add(value as u16);
    sum.to_le_bytes()
}

/// The checksum as the two-hex-digit token pair the camera docs use, e.g. `"13 01"`.
pub fn sumcheck_token(opcode: u8, value: u8) -> String {
    to_hex_string(&sumcheck(opcode, value))
}

/// Build a parameterized command frame.
///
/// Values outside the function's range are rejected before anything is built.
pub fn encode_parameterized(function: ThermalFunction, value: i64) -> Result<Bytes, ProtocolError> {
    let value = function.validate(value)?;
    let d = function.descriptor();
    let [lo, hi] = sumcheck(d.opcode, value);

    let mut frame = Vec::with_capacity(12);
    frame.extend_from_slice(&PARAM_HEAD);
    frame.extend_from_slice(&[lo, hi]);
    frame.extend_from_slice(&d.selector);
    frame.extend_from_slice(&[value, 0x00]);
    Ok(Bytes::from(frame))
}

/// A response whose checksum matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalResponse {
    pub declared_len: u8,
    pub checksum: u16,
    pub payload: Bytes,
}

impl ThermalResponse {
    /// Payload bytes in reverse order as uppercase hex; values are little-endian on the wire.
    pub fn payload_hex_le(&self) -> String {
        let reversed: Vec<u8> = self.payload.iter().rev().copied().collect();
        to_hex_string(&reversed)
    }
}

/// Validate a response frame and slice out its payload.
///
/// `expected_len` is the number of bytes that were requested from the port;
/// anything past it is ignored. A reply shorter than its declared payload is
/// `Truncated`. A checksum mismatch means "no usable response", not a broken
/// link.
pub fn decode_response(bytes: &[u8], expected_len: usize) -> Result<ThermalResponse, ProtocolError> {
    let frame = &bytes[..bytes.len().min(expected_len)];
    if frame.len() < FRAME_HEAD_LEN {
        return Err(ProtocolError::Truncated { len: frame.len() });
    }

    let declared_len = frame[LENGTH_OFFSET];
    let end = FRAME_HEAD_LEN + declared_len as usize;
    if frame.len() < end {
        return Err(ProtocolError::Truncated { len: frame.len() });
    }
    let frame = &frame[..end];

    let received = u16::from_le_bytes([frame[CHECKSUM_LO], frame[CHECKSUM_HI]]);
    let computed = frame_sum(frame);
    if received != computed {
        return Err(ProtocolError::ChecksumMismatch { received, computed });
    }

    Ok(ThermalResponse {
        declared_len,
        checksum: received,
        payload: Bytes::copy_from_slice(&frame[FRAME_HEAD_LEN..]),
    })
}

/// 16-bit sum of the frame with the checksum bytes taken as zero
fn frame_sum(frame: &[u8]) -> u16 {
    let sum: u32 = frame
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != CHECKSUM_LO && *i != CHECKSUM_HI)
        .map(|(_, b)| *b as u32)
        .sum();
    (sum & 0xFFFF) as u16
}

/// `"68 24 04 ..."`
pub fn to_hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}

/// Parse whitespace-separated hex, e.g. an operator-typed command.
pub fn parse_hex(text: &str) -> Result<Bytes, ProtocolError> {
    let compact: String = text.split_whitespace().collect();
    if compact.is_empty() {
        return Err(ProtocolError::InvalidHex("empty command".into()));
    }
    hex::decode(&compact)
        .map(Bytes::from)
        .map_err(|e| ProtocolError::InvalidHex(e.to_string()))
}
