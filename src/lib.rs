//! synthctl - control surface of a multi-part hardware synthesizer
//!
//! Builds parameter instances for every part of a device from a declarative
//! schema, resolves them by structural key, flat index or name, and converts
//! parameter values to and from the device's sysex packets.

pub mod config;
pub mod controller;
pub mod midi;
pub mod packet;
pub mod params;
pub mod registry;
pub mod schema;

pub use config::{AppConfig, DeviceModel};
pub use controller::Controller;
pub use packet::{MidiDataType, MidiPacket, MidiPacketSchema, PacketError, PacketValues};
pub use params::{ParamIndex, ParameterClass, ParameterDescriptionSet, ParameterDescriptor};
pub use registry::{
    ParamId, ParameterGroup, ParameterGroupStore, ParameterHost, ParameterInstance,
    ParameterRegistry,
};
pub use schema::DeviceSchema;
