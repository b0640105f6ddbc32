//! MIDI utilities shared by the codec and the CLI
//!
//! Sysex framing constants plus hex formatting/parsing for debugging output.

use anyhow::{Context, Result};

/// Start of a System Exclusive message
pub const SYSEX_START: u8 = 0xF0;

/// End of a System Exclusive message
pub const SYSEX_END: u8 = 0xF7;

/// Highest MIDI channel / part count a device can address
pub const MAX_PARTS: u8 = 16;

/// Check that a byte sequence is a complete sysex frame (F0 ... F7, 7-bit payload)
pub fn is_sysex_frame(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    data[0] == SYSEX_START
        && data[data.len() - 1] == SYSEX_END
        && data[1..data.len() - 1].iter().all(|b| b & 0x80 == 0)
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a hex dump such as `"F0 00 20 33 F7"` or `"f0002033f7"` into bytes
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    hex::decode(&compact).with_context(|| format!("Invalid hex byte string: {}", text))
}
