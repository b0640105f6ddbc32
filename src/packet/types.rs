//! Packet template types
//!
//! A [`MidiPacket`] is an ordered list of [`PacketByte`] definitions. Each byte is
//! either fixed framing, a masked/shifted slice of a logical field, or a checksum
//! over earlier bytes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Logical field carried by a sysex packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MidiDataType {
    DeviceId,
    ModelId,
    Bank,
    Program,
    Page,
    /// Part / MIDI channel
    #[serde(alias = "channel")]
    Part,
    /// Parameter index within a page
    Index,
    /// Parameter value
    Value,
}

impl MidiDataType {
    pub fn all() -> &'static [MidiDataType] {
        &[
            MidiDataType::DeviceId,
            MidiDataType::ModelId,
            MidiDataType::Bank,
            MidiDataType::Program,
            MidiDataType::Page,
            MidiDataType::Part,
            MidiDataType::Index,
            MidiDataType::Value,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MidiDataType::DeviceId => "deviceid",
            MidiDataType::ModelId => "modelid",
            MidiDataType::Bank => "bank",
            MidiDataType::Program => "program",
            MidiDataType::Page => "page",
            MidiDataType::Part => "part",
            MidiDataType::Index => "index",
            MidiDataType::Value => "value",
        }
    }

    /// Parse a schema/CLI name; `channel` is accepted for `part`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "channel" => Some(MidiDataType::Part),
            _ => Self::all().iter().copied().find(|t| t.as_str() == name),
        }
    }
}

impl fmt::Display for MidiDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field values handed to / produced by the codec
pub type PacketValues = BTreeMap<MidiDataType, u16>;

/// One byte of a field: `(value >> shift) & mask`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldByte {
    pub data_type: MidiDataType,
    pub mask: u8,
    pub shift: u8,
    pub optional: bool,
    /// Used on encode when an optional field is absent
    pub default: u16,
}

impl FieldByte {
    /// Bits of the field value this byte carries
    pub fn coverage(&self) -> u16 {
        ((self.mask as u32) << self.shift) as u16
    }
}

/// Byte definition inside a packet template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketByte {
    /// Fixed framing byte (status, manufacturer, command, end)
    Fixed(u8),
    /// Slice of a logical field value
    Field(FieldByte),
    /// `(init + sum(bytes[first..=last])) & 0x7F`
    Checksum { first: usize, last: usize, init: u8 },
}

/// Named, immutable packet template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPacket {
    pub(crate) name: String,
    pub(crate) bytes: Vec<PacketByte>,
}

impl MidiPacket {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[PacketByte] {
        &self.bytes
    }

    /// Total length of the packet on the wire
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Data types referenced by this packet, in first-appearance order
    pub fn fields(&self) -> Vec<MidiDataType> {
        let mut fields = Vec::new();
        for byte in &self.bytes {
            if let PacketByte::Field(f) = byte {
                if !fields.contains(&f.data_type) {
                    fields.push(f.data_type);
                }
            }
        }
        fields
    }

    /// Data types that must be present in the value map on encode
    pub fn required_fields(&self) -> Vec<MidiDataType> {
        let mut fields = Vec::new();
        for byte in &self.bytes {
            if let PacketByte::Field(f) = byte {
                if !f.optional && !fields.contains(&f.data_type) {
                    fields.push(f.data_type);
                }
            }
        }
        fields
    }

    /// Copy of `values` restricted to this packet's fields, with absent
    /// optional fields set to their defaults
    ///
    /// This is what `parse` yields for bytes produced by `create(values)`.
    pub fn with_defaults(&self, values: &PacketValues) -> PacketValues {
        let mut out = PacketValues::new();
        for byte in &self.bytes {
            if let PacketByte::Field(f) = byte {
                match values.get(&f.data_type) {
                    Some(&v) => {
                        out.insert(f.data_type, v);
                    }
                    None if f.optional => {
                        out.entry(f.data_type).or_insert(f.default);
                    }
                    None => {}
                }
            }
        }
        out
    }

    pub fn has_field(&self, data_type: MidiDataType) -> bool {
        self.bytes
            .iter()
            .any(|b| matches!(b, PacketByte::Field(f) if f.data_type == data_type))
    }

    /// Union of all bits a data type can carry in this packet
    pub fn coverage(&self, data_type: MidiDataType) -> u16 {
        self.bytes
            .iter()
            .filter_map(|b| match b {
                PacketByte::Field(f) if f.data_type == data_type => Some(f.coverage()),
                _ => None,
            })
            .fold(0, |acc, c| acc | c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_names() {
        assert_eq!(MidiDataType::from_name("channel"), Some(MidiDataType::Part));
        assert_eq!(MidiDataType::from_name("part"), Some(MidiDataType::Part));
        assert_eq!(MidiDataType::from_name("value"), Some(MidiDataType::Value));
        assert_eq!(MidiDataType::from_name("Value"), None);
        for t in MidiDataType::all() {
            assert_eq!(MidiDataType::from_name(t.as_str()), Some(*t));
        }
    }

    #[test]
    fn test_data_type_serde_alias() {
        let t: MidiDataType = serde_json::from_str("\"channel\"").unwrap();
        assert_eq!(t, MidiDataType::Part);
        assert_eq!(serde_json::to_string(&MidiDataType::DeviceId).unwrap(), "\"deviceid\"");
    }

    #[test]
    fn test_field_coverage() {
        let msb = FieldByte {
            data_type: MidiDataType::Value,
            mask: 0x7F,
            shift: 7,
            optional: false,
            default: 0,
        };
        assert_eq!(msb.coverage(), 0x3F80);

        let packet = MidiPacket {
            name: "wide".to_string(),
            bytes: vec![
                PacketByte::Fixed(0xF0),
                PacketByte::Field(msb),
                PacketByte::Field(FieldByte { shift: 0, ..msb }),
                PacketByte::Fixed(0xF7),
            ],
        };
        assert_eq!(packet.coverage(MidiDataType::Value), 0x3FFF);
        assert_eq!(packet.fields(), vec![MidiDataType::Value]);
        assert!(!packet.has_field(MidiDataType::Part));
    }

    #[test]
    fn test_with_defaults() {
        let packet = MidiPacket {
            name: "req".to_string(),
            bytes: vec![
                PacketByte::Fixed(0xF0),
                PacketByte::Field(FieldByte {
                    data_type: MidiDataType::DeviceId,
                    mask: 0x7F,
                    shift: 0,
                    optional: true,
                    default: 0x10,
                }),
                PacketByte::Field(FieldByte {
                    data_type: MidiDataType::Part,
                    mask: 0x7F,
                    shift: 0,
                    optional: false,
                    default: 0,
                }),
                PacketByte::Fixed(0xF7),
            ],
        };
        let mut values = PacketValues::new();
        values.insert(MidiDataType::Part, 3);
        values.insert(MidiDataType::Bank, 9);

        let filled = packet.with_defaults(&values);
        assert_eq!(filled.get(&MidiDataType::DeviceId), Some(&0x10));
        assert_eq!(filled.get(&MidiDataType::Part), Some(&3));
        assert!(!filled.contains_key(&MidiDataType::Bank));

        values.insert(MidiDataType::DeviceId, 0x22);
        assert_eq!(packet.with_defaults(&values).get(&MidiDataType::DeviceId), Some(&0x22));
    }
}
