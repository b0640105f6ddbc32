//! Packet schema loading and validation
//!
//! Parses the `midipackets` section of a schema document:
//!
//! ```json
//! "midipackets": {
//!     "SetParam": [
//!         {"type": "byte", "value": "f0"},
//!         {"type": "part"},
//!         {"type": "value", "mask": "7f", "shift": 0},
//!         {"type": "checksum", "first": 1, "last": 2},
//!         {"type": "byte", "value": "f7"}
//!     ]
//! }
//! ```

use super::error::PacketError;
use super::types::{FieldByte, MidiDataType, MidiPacket, PacketByte, PacketValues};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// Byte definition as written in the schema JSON
#[derive(Debug, Clone, Deserialize)]
struct RawPacketByte {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    mask: Option<String>,
    #[serde(default)]
    shift: u8,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    default: Option<u16>,
    #[serde(default)]
    first: Option<usize>,
    #[serde(default)]
    last: Option<usize>,
    #[serde(default)]
    init: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPacketSections {
    #[serde(default, rename = "midipackets")]
    packets: BTreeMap<String, Vec<RawPacketByte>>,
}

/// All named packet templates of a device
#[derive(Debug, Clone, Default)]
pub struct MidiPacketSchema {
    packets: BTreeMap<String, Arc<MidiPacket>>,
}

impl MidiPacketSchema {
    /// Parse the `midipackets` section of a schema document
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawPacketSections =
            serde_json::from_str(json).context("Failed to parse midi packet definitions")?;

        let mut packets = BTreeMap::new();
        for (name, raw_bytes) in raw.packets {
            let packet = parse_packet(&name, &raw_bytes)
                .with_context(|| format!("Invalid midi packet '{}'", name))?;
            packets.insert(name, Arc::new(packet));
        }

        info!("Loaded {} midi packet definitions", packets.len());
        Ok(Self { packets })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<MidiPacket>> {
        self.packets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packets.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Resolve a packet by name and encode the value map into it
    pub fn encode(&self, packet_name: &str, values: &PacketValues) -> Result<Vec<u8>, PacketError> {
        self.get(packet_name)
            .ok_or_else(|| PacketError::UnknownPacket(packet_name.to_string()))?
            .create(values)
    }

    /// Resolve a packet by name and decode received bytes with it
    pub fn decode(&self, packet_name: &str, data: &[u8]) -> Result<PacketValues, PacketError> {
        self.get(packet_name)
            .ok_or_else(|| PacketError::UnknownPacket(packet_name.to_string()))?
            .parse(data)
    }
}

fn parse_hex_byte(text: &str, what: &str) -> Result<u8> {
    let trimmed = text.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(trimmed, 16).with_context(|| format!("Invalid {} '{}' (expected hex byte)", what, text))
}

fn parse_packet(name: &str, raw_bytes: &[RawPacketByte]) -> Result<MidiPacket> {
    if raw_bytes.is_empty() {
        anyhow::bail!("Packet has no bytes");
    }

    let mut bytes = Vec::with_capacity(raw_bytes.len());
    let mut coverage: HashMap<MidiDataType, u16> = HashMap::new();
    let mut optional_flags: HashMap<MidiDataType, bool> = HashMap::new();

    for (position, raw) in raw_bytes.iter().enumerate() {
        let byte = match raw.kind.as_str() {
            "byte" => {
                let value = raw
                    .value
                    .as_deref()
                    .with_context(|| format!("Byte {} is fixed but has no 'value'", position))?;
                PacketByte::Fixed(parse_hex_byte(value, "byte value")?)
            }
            "checksum" => {
                let first = raw
                    .first
                    .with_context(|| format!("Checksum at byte {} has no 'first'", position))?;
                let last = raw
                    .last
                    .with_context(|| format!("Checksum at byte {} has no 'last'", position))?;
                if first > last || last >= position {
                    anyhow::bail!(
                        "Checksum at byte {} covers {}..={}, which must lie before it",
                        position,
                        first,
                        last
                    );
                }
                let init = match &raw.init {
                    Some(text) => parse_hex_byte(text, "checksum init")?,
                    None => 0,
                };
                PacketByte::Checksum { first, last, init }
            }
            kind => {
                let data_type = MidiDataType::from_name(kind)
                    .with_context(|| format!("Unknown byte type '{}' at byte {}", kind, position))?;
                let mask = match &raw.mask {
                    Some(text) => parse_hex_byte(text, "mask")?,
                    None => 0x7F,
                };
                if mask == 0 {
                    anyhow::bail!("Field '{}' at byte {} has an empty mask", data_type, position);
                }
                if raw.shift > 15 || ((mask as u32) << raw.shift) > u16::MAX as u32 {
                    anyhow::bail!(
                        "Field '{}' at byte {} shifts mask {:02X} by {} beyond 16 bits",
                        data_type,
                        position,
                        mask,
                        raw.shift
                    );
                }

                let field = FieldByte {
                    data_type,
                    mask,
                    shift: raw.shift,
                    optional: raw.optional,
                    default: raw.default.unwrap_or(0),
                };

                let covered = coverage.entry(data_type).or_insert(0);
                if *covered & field.coverage() != 0 {
                    anyhow::bail!(
                        "Field '{}' at byte {} overlaps bits of an earlier byte",
                        data_type,
                        position
                    );
                }
                *covered |= field.coverage();

                if let Some(previous) = optional_flags.insert(data_type, raw.optional) {
                    if previous != raw.optional {
                        anyhow::bail!(
                            "Field '{}' is optional in some bytes and required in others",
                            data_type
                        );
                    }
                }

                PacketByte::Field(field)
            }
        };
        bytes.push(byte);
    }

    for byte in &bytes {
        if let PacketByte::Field(f) = byte {
            if f.optional && f.default & !coverage[&f.data_type] != 0 {
                anyhow::bail!("Default {} for field '{}' does not fit the packet", f.default, f.data_type);
            }
        }
    }

    Ok(MidiPacket {
        name: name.to_string(),
        bytes,
    })
}
