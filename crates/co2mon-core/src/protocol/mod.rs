//! Protocol module - CO2 mini report format.

pub mod constants;
pub mod decoder;
pub mod frame;
pub mod measurement;

pub use constants::*;
pub use decoder::{FrameVerdict, RejectReason, inspect, validate_and_decode};
pub use frame::{ArmingKey, KeyParseError, ProtocolVariant, RawFrame};
pub use measurement::Measurement;
