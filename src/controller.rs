//! Controller - registry plus codec, as used by the host and transport layers
//!
//! Owns the device schema and the parameter registry built from it, turns
//! parameter values into sysex packets and applies received packets back onto
//! the parameter instances.

use crate::config::DeviceModel;
use crate::midi::format_hex;
use crate::packet::{MidiDataType, MidiPacket, MidiPacketSchema, PacketError, PacketValues};
use crate::params::{ParamIndex, ParameterDescriptionSet};
use crate::registry::{ParamId, ParameterHost, ParameterInstance, ParameterRegistry};
use crate::schema::DeviceSchema;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default sysex device id when none is configured
pub const DEFAULT_DEVICE_ID: u8 = 0x10;

pub struct Controller {
    schema: DeviceSchema,
    model: DeviceModel,
    device_id: u8,
    registry: ParameterRegistry,
}

impl Controller {
    /// Build the registry for the model's part count, handing public parameters to `host`
    pub fn new(schema: DeviceSchema, model: DeviceModel, host: &mut dyn ParameterHost) -> Self {
        let registry = ParameterRegistry::build(&schema.parameters, model.part_count(), host);
        Self {
            schema,
            model,
            device_id: DEFAULT_DEVICE_ID,
            registry,
        }
    }

    /// Device id used when a packet's `deviceid` field is not given
    ///
    /// Stored as given; an id above 0x7F makes encoding fail with `ValueOutOfRange`.
    pub fn with_device_id(mut self, device_id: u8) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    pub fn part_count(&self) -> u8 {
        self.registry.part_count()
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn descriptions(&self) -> &ParameterDescriptionSet {
        &self.schema.parameters
    }

    pub fn packets(&self) -> &MidiPacketSchema {
        &self.schema.packets
    }

    pub fn find_synth_param(&self, part: u8, page: u8, index: u8) -> &[ParamId] {
        self.registry.find_synth_param_at(part, page, index)
    }

    /// Parameter at a flat index of the first part
    pub fn get_parameter(&self, index: u32) -> Option<Arc<ParameterInstance>> {
        self.get_parameter_in_part(index, 0)
    }

    pub fn get_parameter_in_part(&self, index: u32, part: u8) -> Option<Arc<ParameterInstance>> {
        self.registry.get_parameter(index, part)
    }

    /// Current value of the parameter at a flat index of the first part
    pub fn param_value(&self, index: u32) -> Option<i32> {
        self.get_parameter(index).map(|p| p.value())
    }

    pub fn parameter_index_by_name(&self, name: &str) -> Option<u32> {
        self.schema.parameters.index_by_name(name)
    }

    pub fn midi_packet(&self, name: &str) -> Option<&Arc<MidiPacket>> {
        self.schema.packets.get(name)
    }

    /// Encode a packet; the configured device id fills in an absent `deviceid` field
    ///
    /// Failures are logged and returned; no bytes are produced for them.
    pub fn create_midi_data_from_packet(
        &self,
        packet_name: &str,
        values: &PacketValues,
    ) -> Result<Vec<u8>, PacketError> {
        let Some(packet) = self.midi_packet(packet_name) else {
            error!("Midi packet '{}' not found", packet_name);
            return Err(PacketError::UnknownPacket(packet_name.to_string()));
        };

        let mut values = values.clone();
        if packet.has_field(MidiDataType::DeviceId) {
            values
                .entry(MidiDataType::DeviceId)
                .or_insert(self.device_id as u16);
        }

        packet.create(&values).map_err(|e| {
            error!("Failed to create midi packet: {}", e);
            e
        })
    }

    /// Field values describing the current state of one instance
    pub fn parameter_change_values(&self, id: ParamId) -> Result<PacketValues, PacketError> {
        let instance = self
            .registry
            .instance(id)
            .ok_or(PacketError::UnknownParameter(id.0))?;
        let desc = instance.descriptor();
        let value = instance.value();
        let wire = desc.to_wire(value).ok_or_else(|| PacketError::UnencodableValue {
            parameter: desc.name.clone(),
            value,
        })?;

        let mut values = PacketValues::new();
        values.insert(MidiDataType::Page, desc.page as u16);
        values.insert(MidiDataType::Part, instance.part() as u16);
        values.insert(MidiDataType::Index, desc.index as u16);
        values.insert(MidiDataType::Value, wire);
        Ok(values)
    }

    /// Encode the current value of an instance with the given packet
    pub fn create_parameter_change(&self, packet_name: &str, id: ParamId) -> Result<Vec<u8>, PacketError> {
        let values = self.parameter_change_values(id).map_err(|e| {
            error!("Failed to create parameter change: {}", e);
            e
        })?;
        self.create_midi_data_from_packet(packet_name, &values)
    }

    /// Set an instance's value and mirror it onto every linked instance
    ///
    /// Returns how many instances were updated.
    pub fn set_parameter_value(&self, id: ParamId, value: i32) -> usize {
        let mut visited = HashSet::new();
        self.propagate(id, value, &mut visited);
        visited.len()
    }

    fn propagate(&self, id: ParamId, value: i32, visited: &mut HashSet<ParamId>) {
        if !visited.insert(id) {
            return;
        }
        match self.registry.instance(id) {
            Some(instance) => {
                instance.set_value(value);
            }
            None => {
                visited.remove(&id);
                return;
            }
        }
        for &linked in self.registry.linked_parameters(id) {
            self.propagate(linked, value, visited);
        }
    }

    /// Decode an inbound parameter-change packet and update the addressed instances
    ///
    /// Part-shared parameters are found at part 0 whatever part the packet names.
    /// Returns how many instances changed (linked ones included).
    pub fn apply_parameter_change(&self, packet_name: &str, data: &[u8]) -> Result<usize, PacketError> {
        let values = self.schema.packets.decode(packet_name, data).map_err(|e| {
            warn!("Rejected inbound packet {}: {}", format_hex(data), e);
            e
        })?;

        let field = |data_type: MidiDataType| {
            values.get(&data_type).copied().ok_or_else(|| PacketError::MissingField {
                packet: packet_name.to_string(),
                field: data_type,
            })
        };
        // page, part and index are single bytes in the registry key
        let narrow = |data_type: MidiDataType, value: u16| {
            u8::try_from(value).map_err(|_| PacketError::ValueOutOfRange {
                packet: packet_name.to_string(),
                field: data_type,
                value,
            })
        };
        let page = narrow(MidiDataType::Page, field(MidiDataType::Page)?)?;
        let index = narrow(MidiDataType::Index, field(MidiDataType::Index)?)?;
        let wire = field(MidiDataType::Value)?;
        let part = narrow(
            MidiDataType::Part,
            values.get(&MidiDataType::Part).copied().unwrap_or(0),
        )?;

        let mut targets: Vec<ParamId> = self.registry.find_synth_param_at(part, page, index).to_vec();
        if targets.is_empty() && part != 0 {
            targets = self
                .registry
                .instances_at(ParamIndex::new(page, 0, index))
                .iter()
                .filter(|p| p.descriptor().is_part_shared())
                .map(|p| p.id())
                .collect();
        }

        if targets.is_empty() {
            debug!("No parameter at page {} part {} index {}", page, part, index);
            return Ok(0);
        }

        let mut visited = HashSet::new();
        for id in targets {
            if let Some(instance) = self.registry.instance(id) {
                let value = instance.descriptor().from_wire(wire);
                self.propagate(id, value, &mut visited);
            }
        }

        debug!(
            "Applied value {} at page {} part {} index {} to {} instance(s)",
            wire,
            page,
            part,
            index,
            visited.len()
        );
        Ok(visited.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParameterGroupStore;

    const SCHEMA: &str = r#"{
        "parameterdescriptions": [
            {"page": 0, "index": 5, "name": "Clock Tempo", "min": 63, "max": 190, "default": 120, "class": "Global"},
            {"page": 1, "index": 3, "name": "Cutoff", "default": 64},
            {"page": 1, "index": 3, "name": "Cutoff Alias"},
            {"page": 1, "index": 20, "name": "Pan", "min": -64, "max": 63},
            {"page": 1, "index": 9, "name": "Part Enable", "max": 1, "isBool": true, "isPublic": false}
        ],
        "midipackets": {
            "SetParam": [
                {"type": "byte", "value": "f0"},
                {"type": "byte", "value": "00"},
                {"type": "byte", "value": "20"},
                {"type": "byte", "value": "33"},
                {"type": "deviceid"},
                {"type": "page"},
                {"type": "part"},
                {"type": "index"},
                {"type": "value"},
                {"type": "checksum", "first": 4, "last": 8},
                {"type": "byte", "value": "f7"}
            ]
        }
    }"#;

    fn make_controller(model: DeviceModel) -> (Controller, ParameterGroupStore) {
        let schema = DeviceSchema::from_json(SCHEMA).unwrap();
        let mut store = ParameterGroupStore::new();
        let controller = Controller::new(schema, model, &mut store);
        (controller, store)
    }

    #[test]
    fn test_part_count_follows_model() {
        let (snow, _s1) = make_controller(DeviceModel::Snow);
        assert_eq!(snow.part_count(), 4);
        assert_eq!(snow.registry().parameter_count(3), 5);
        assert!(snow.get_parameter_in_part(0, 4).is_none());

        let (c, _s2) = make_controller(DeviceModel::C);
        assert_eq!(c.part_count(), 16);
        // tempo once, four per-part parameters on 16 parts
        assert_eq!(c.registry().instance_count(), 1 + 4 * 16);
    }

    #[test]
    fn test_lookups() {
        let (controller, _store) = make_controller(DeviceModel::Snow);
        assert_eq!(controller.parameter_index_by_name("Pan"), Some(3));
        assert_eq!(controller.parameter_index_by_name("Nope"), None);
        assert_eq!(controller.param_value(0), Some(120));
        assert_eq!(controller.param_value(1), Some(64));
        assert_eq!(controller.param_value(99), None);
        assert_eq!(controller.find_synth_param(2, 1, 3).len(), 2);
        assert!(controller.midi_packet("SetParam").is_some());
    }

    #[test]
    fn test_create_midi_data_fills_device_id() {
        let (controller, _store) = make_controller(DeviceModel::Snow);
        let controller = controller.with_device_id(0x01);

        let mut values = PacketValues::new();
        values.insert(MidiDataType::Page, 0x71);
        values.insert(MidiDataType::Part, 2);
        values.insert(MidiDataType::Index, 3);
        values.insert(MidiDataType::Value, 100);

        let bytes = controller.create_midi_data_from_packet("SetParam", &values).unwrap();
        assert_eq!(bytes[4], 0x01);
        assert_eq!(bytes.len(), 11);
        assert_eq!(bytes[9], ((0x01u32 + 0x71 + 2 + 3 + 100) & 0x7F) as u8);
    }

    #[test]
    fn test_create_midi_data_failures() {
        let (controller, _store) = make_controller(DeviceModel::Snow);
        assert_eq!(
            controller.create_midi_data_from_packet("Missing", &PacketValues::new()),
            Err(PacketError::UnknownPacket("Missing".to_string()))
        );

        let mut values = PacketValues::new();
        values.insert(MidiDataType::Page, 1);
        values.insert(MidiDataType::Part, 0);
        values.insert(MidiDataType::Index, 3);
        assert!(matches!(
            controller.create_midi_data_from_packet("SetParam", &values),
            Err(PacketError::MissingField { field: MidiDataType::Value, .. })
        ));
    }

    #[test]
    fn test_device_id_is_not_masked() {
        let (controller, _store) = make_controller(DeviceModel::Snow);
        let controller = controller.with_device_id(0x7F);
        assert_eq!(controller.device_id(), 0x7F);

        let controller = controller.with_device_id(0x90);
        assert_eq!(controller.device_id(), 0x90);

        let mut values = PacketValues::new();
        values.insert(MidiDataType::Page, 1);
        values.insert(MidiDataType::Part, 0);
        values.insert(MidiDataType::Index, 3);
        values.insert(MidiDataType::Value, 5);
        assert_eq!(
            controller.create_midi_data_from_packet("SetParam", &values),
            Err(PacketError::ValueOutOfRange {
                packet: "SetParam".to_string(),
                field: MidiDataType::DeviceId,
                value: 0x90,
            })
        );
    }

    #[test]
    fn test_parameter_change_unknown_id() {
        let (controller, _store) = make_controller(DeviceModel::Snow);
        let unknown = ParamId(controller.registry().instance_count() as u32 + 10);
        assert_eq!(
            controller.create_parameter_change("SetParam", unknown),
            Err(PacketError::UnknownParameter(unknown.0))
        );
        assert!(controller.parameter_change_values(unknown).is_err());
    }

    #[test]
    fn test_set_value_mirrors_linked() {
        let (controller, _store) = make_controller(DeviceModel::Snow);
        let ids = controller.find_synth_param(1, 1, 3).to_vec();

        assert_eq!(controller.set_parameter_value(ids[1], 99), 2);
        for id in &ids {
            assert_eq!(controller.registry().instance(*id).unwrap().value(), 99);
        }
        // other parts untouched
        let other = controller.find_synth_param(0, 1, 3)[0];
        assert_eq!(controller.registry().instance(other).unwrap().value(), 64);
    }

    #[test]
    fn test_parameter_change_round_trip() {
        let (controller, _store) = make_controller(DeviceModel::Snow);
        let pan = controller.find_synth_param(2, 1, 20)[0];
        controller.set_parameter_value(pan, -10);

        let bytes = controller.create_parameter_change("SetParam", pan).unwrap();
        assert_eq!(bytes[8], 54); // -10 offset by 64

        controller.set_parameter_value(pan, 0);
        assert_eq!(controller.apply_parameter_change("SetParam", &bytes), Ok(1));
        assert_eq!(controller.registry().instance(pan).unwrap().value(), -10);
    }

    #[test]
    fn test_apply_updates_linked_and_global() {
        let (controller, _store) = make_controller(DeviceModel::Snow);

        let mut values = PacketValues::new();
        values.insert(MidiDataType::Page, 1);
        values.insert(MidiDataType::Part, 3);
        values.insert(MidiDataType::Index, 3);
        values.insert(MidiDataType::Value, 10);
        let bytes = controller.create_midi_data_from_packet("SetParam", &values).unwrap();
        assert_eq!(controller.apply_parameter_change("SetParam", &bytes), Ok(2));
        assert_eq!(controller.get_parameter_in_part(1, 3).unwrap().value(), 10);
        assert_eq!(controller.get_parameter_in_part(2, 3).unwrap().value(), 10);

        // tempo addressed on part 2 reaches the single global instance
        values.insert(MidiDataType::Page, 0);
        values.insert(MidiDataType::Part, 2);
        values.insert(MidiDataType::Index, 5);
        values.insert(MidiDataType::Value, 100);
        let bytes = controller.create_midi_data_from_packet("SetParam", &values).unwrap();
        assert_eq!(controller.apply_parameter_change("SetParam", &bytes), Ok(1));
        assert_eq!(controller.param_value(0), Some(100));
    }

    #[test]
    fn test_apply_rejects_part_beyond_one_byte() {
        let json = SCHEMA.replace(
            r#""SetParam": ["#,
            r#""WidePart": [
                {"type": "byte", "value": "f0"},
                {"type": "page"},
                {"type": "part", "shift": 7},
                {"type": "part"},
                {"type": "index"},
                {"type": "value"},
                {"type": "byte", "value": "f7"}
            ],
            "SetParam": ["#,
        );
        let schema = DeviceSchema::from_json(&json).unwrap();
        let mut store = ParameterGroupStore::new();
        let controller = Controller::new(schema, DeviceModel::Snow, &mut store);

        // part 256 would wrap to part 0 if narrowed blindly
        let bytes = [0xF0, 0x01, 0x02, 0x00, 0x03, 0x0A, 0xF7];
        assert_eq!(
            controller.apply_parameter_change("WidePart", &bytes),
            Err(PacketError::ValueOutOfRange {
                packet: "WidePart".to_string(),
                field: MidiDataType::Part,
                value: 256,
            })
        );
        assert_eq!(controller.get_parameter_in_part(1, 0).unwrap().value(), 64);

        let bytes = [0xF0, 0x01, 0x00, 0x01, 0x03, 0x0A, 0xF7];
        assert_eq!(controller.apply_parameter_change("WidePart", &bytes), Ok(2));
        assert_eq!(controller.get_parameter_in_part(1, 1).unwrap().value(), 10);
    }

    #[test]
    fn test_apply_rejects_bad_packets() {
        let (controller, _store) = make_controller(DeviceModel::Snow);
        assert!(matches!(
            controller.apply_parameter_change("SetParam", &[0xF0, 0xF7]),
            Err(PacketError::LengthMismatch { .. })
        ));

        let mut values = PacketValues::new();
        values.insert(MidiDataType::Page, 9);
        values.insert(MidiDataType::Part, 0);
        values.insert(MidiDataType::Index, 9);
        values.insert(MidiDataType::Value, 1);
        let bytes = controller.create_midi_data_from_packet("SetParam", &values).unwrap();
        assert_eq!(controller.apply_parameter_change("SetParam", &bytes), Ok(0));
    }
}
