//! Template-driven sysex encoding and decoding

use super::error::PacketError;
use super::types::{MidiPacket, PacketByte, PacketValues};
use crate::midi::format_hex;
use tracing::debug;

/// Roland-style 7-bit additive checksum
pub fn checksum(bytes: &[u8], init: u8) -> u8 {
    let sum = bytes
        .iter()
        .fold(init as u32, |acc, b| acc.wrapping_add(*b as u32));
    (sum & 0x7F) as u8
}

impl MidiPacket {
    /// Build the wire bytes for this packet from a value map
    ///
    /// Entries for data types the packet does not use are ignored. Either the
    /// complete packet is returned or an error, never a partial buffer.
    pub fn create(&self, values: &PacketValues) -> Result<Vec<u8>, PacketError> {
        for field in self.fields() {
            if let Some(&value) = values.get(&field) {
                if value & !self.coverage(field) != 0 {
                    return Err(PacketError::ValueOutOfRange {
                        packet: self.name.clone(),
                        field,
                        value,
                    });
                }
            }
        }

        let mut out = Vec::with_capacity(self.bytes.len());
        for byte in &self.bytes {
            let b = match *byte {
                PacketByte::Fixed(v) => v,
                PacketByte::Field(f) => {
                    let value = match values.get(&f.data_type) {
                        Some(&v) => v,
                        None if f.optional => f.default,
                        None => {
                            return Err(PacketError::MissingField {
                                packet: self.name.clone(),
                                field: f.data_type,
                            })
                        }
                    };
                    ((value >> f.shift) & f.mask as u16) as u8
                }
                PacketByte::Checksum { first, last, init } => checksum(&out[first..=last], init),
            };
            out.push(b);
        }

        debug!("Encoded '{}': {}", self.name, format_hex(&out));
        Ok(out)
    }

    /// Extract field values from received bytes
    ///
    /// Every field byte must stay within its mask. Optional fields are always
    /// reported, so `parse(create(v)) == with_defaults(v)`.
    pub fn parse(&self, data: &[u8]) -> Result<PacketValues, PacketError> {
        if data.len() != self.bytes.len() {
            return Err(PacketError::LengthMismatch {
                packet: self.name.clone(),
                expected: self.bytes.len(),
                actual: data.len(),
            });
        }

        let mut values = PacketValues::new();
        for (position, (def, &b)) in self.bytes.iter().zip(data).enumerate() {
            match *def {
                PacketByte::Fixed(expected) => {
                    if b != expected {
                        return Err(PacketError::FramingMismatch {
                            packet: self.name.clone(),
                            position,
                            expected,
                            actual: b,
                        });
                    }
                }
                PacketByte::Field(f) => {
                    if b & !f.mask != 0 {
                        return Err(PacketError::InvalidDataByte {
                            packet: self.name.clone(),
                            position,
                            mask: f.mask,
                            actual: b,
                        });
                    }
                    *values.entry(f.data_type).or_insert(0) |= (b as u16) << f.shift;
                }
                PacketByte::Checksum { first, last, init } => {
                    let expected = checksum(&data[first..=last], init);
                    if b != expected {
                        return Err(PacketError::ChecksumMismatch {
                            packet: self.name.clone(),
                            expected,
                            actual: b,
                        });
                    }
                }
            }
        }

        debug!("Decoded '{}': {:?}", self.name, values);
        Ok(values)
    }
}
