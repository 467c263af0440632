//! Laser rangefinder continuous-measurement protocol
//!
//! After [`START_CONTINUOUS`] the rangefinder streams fixed 8-byte frames.
//! Byte 4 flags a valid return, bytes 5–6 hold the distance in decimetres,
//! big-endian. There is no length prefix; every frame opens with `55 AA`
//! and the assembler drops bytes until that header lines up.

use std::fmt;
use std::time::SystemTime;

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

pub const FRAME_LEN: usize = 8;
pub const HEADER: [u8; 2] = [0x55, 0xAA];

pub const START_CONTINUOUS: [u8; FRAME_LEN] = [0x55, 0xAA, 0x89, 0xFF, 0xFF, 0xFF, 0xFF, 0x85];
pub const STOP_MEASUREMENT: [u8; FRAME_LEN] = [0x55, 0xAA, 0x8E, 0xFF, 0xFF, 0xFF, 0xFF, 0x8A];

const VALID_OFFSET: usize = 4;
const DISTANCE_HI: usize = 5;
const DISTANCE_LO: usize = 6;

/// One validated distance measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSample {
    /// Metres, one decimal place
    pub distance_m: f32,
    pub timestamp: SystemTime,
    pub valid: bool,
}

impl fmt::Display for RangeSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Range: {:.1} m", self.distance_m)
    }
}

/// Overlay text for an optional sample
pub fn range_label(sample: Option<&RangeSample>) -> String {
    match sample {
        Some(s) => s.to_string(),
        None => "Range: --.- m".to_string(),
    }
}

/// Decode one frame. `None` means "no target", which is normal.
pub fn parse(frame: &[u8; FRAME_LEN]) -> Option<RangeSample> {
    let flag = frame[VALID_OFFSET];
    if flag == 0 {
        return None;
    }
    let decimetres = u16::from_be_bytes([frame[DISTANCE_HI], frame[DISTANCE_LO]]);
    Some(RangeSample {
        distance_m: decimetres as f32 / 10.0,
        timestamp: SystemTime::now(),
        valid: flag != 0,
    })
}

/// Buffers the byte stream and hands out whole frames.
///
/// Bounded: if the reader falls far behind, the oldest bytes are overwritten.
pub struct FrameAssembler {
    ring: HeapRb<u8>,
    discarded: u64,
}

impl FrameAssembler {
    pub fn new(capacity_frames: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity_frames.max(1) * FRAME_LEN),
            discarded: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.ring.push_slice_overwrite(bytes);
    }

    /// Buffered byte count
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Bytes dropped while hunting for a header since the last call
    pub fn take_discarded(&mut self) -> u64 {
        std::mem::take(&mut self.discarded)
    }

    /// Take the next frame once a header and 8 bytes are available.
    pub fn next_frame(&mut self) -> Option<[u8; FRAME_LEN]> {
        self.resync();
        if self.ring.occupied_len() < FRAME_LEN {
            return None;
        }
        let mut frame = [0u8; FRAME_LEN];
        let n = self.ring.pop_slice(&mut frame);
        debug_assert_eq!(n, FRAME_LEN);
        Some(frame)
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }

    fn resync(&mut self) {
        loop {
            let first = self.ring.iter().next().copied();
            let second = self.ring.iter().nth(1).copied();
            let aligned = match (first, second) {
                (Some(a), Some(b)) => [a, b] == HEADER,
                (Some(a), None) => a == HEADER[0],
                (None, _) => true,
            };
            if aligned {
                return;
            }
            self.discarded += self.ring.skip(1) as u64;
        }
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(16)
    }
}
