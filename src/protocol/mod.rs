//! Serial wire protocols for the thermal camera and the rangefinder

pub mod rangefinder;
pub mod thermal;

pub use rangefinder::{FrameAssembler, RangeSample};
pub use thermal::{
    decode_response, encode_fixed, encode_parameterized, CameraPalette, EncodedCommand,
    FixedCommand, InfoRequest, ThermalFunction, ThermalRequest, ThermalResponse,
};
