//! Sysex packet templates and the schema-driven codec

pub mod codec;
pub mod error;
pub mod schema;
pub mod types;

pub use codec::checksum;
pub use error::PacketError;
pub use schema::MidiPacketSchema;
pub use types::{FieldByte, MidiDataType, MidiPacket, PacketByte, PacketValues};
