//! Sysex encode/decode failures

use super::types::MidiDataType;
use thiserror::Error;

/// Errors returned by the packet codec. No partial output accompanies any of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("midi packet '{0}' not found")]
    UnknownPacket(String),

    #[error("packet '{packet}' requires field '{field}'")]
    MissingField { packet: String, field: MidiDataType },

    #[error("value {value} for field '{field}' does not fit packet '{packet}'")]
    ValueOutOfRange {
        packet: String,
        field: MidiDataType,
        value: u16,
    },

    #[error("packet '{packet}' expects {expected} bytes, got {actual}")]
    LengthMismatch {
        packet: String,
        expected: usize,
        actual: usize,
    },

    #[error("packet '{packet}' byte {position}: expected {expected:02X}, got {actual:02X}")]
    FramingMismatch {
        packet: String,
        position: usize,
        expected: u8,
        actual: u8,
    },

    #[error("packet '{packet}' byte {position}: {actual:02X} has bits outside mask {mask:02X}")]
    InvalidDataByte {
        packet: String,
        position: usize,
        mask: u8,
        actual: u8,
    },

    #[error("parameter {0} is not registered")]
    UnknownParameter(u32),

    #[error("value {value} of parameter '{parameter}' does not fit a 16-bit field")]
    UnencodableValue { parameter: String, value: i32 },

    #[error("packet '{packet}' checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    ChecksumMismatch {
        packet: String,
        expected: u8,
        actual: u8,
    },
}
