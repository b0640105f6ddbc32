//! Device schema document: parameter descriptions plus midi packet templates
//!
//! Both halves live in one JSON file per device family and are loaded once at
//! startup. Any malformed entry fails the whole load.

use crate::packet::MidiPacketSchema;
use crate::params::ParameterDescriptionSet;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

/// Immutable schema shared by the registry and the codec
#[derive(Debug, Clone)]
pub struct DeviceSchema {
    pub parameters: Arc<ParameterDescriptionSet>,
    pub packets: Arc<MidiPacketSchema>,
}

impl DeviceSchema {
    /// Parse a schema document from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let parameters = ParameterDescriptionSet::from_json(json)?;
        let packets = MidiPacketSchema::from_json(json)?;
        Ok(Self {
            parameters: Arc::new(parameters),
            packets: Arc::new(packets),
        })
    }

    /// Load a schema document from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?;

        let schema = Self::from_json(&contents)
            .with_context(|| format!("Invalid schema file: {}", path.display()))?;

        info!(
            "Schema {} loaded: {} parameters, {} packets",
            path.display(),
            schema.parameters.len(),
            schema.packets.len()
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"{
        "parameterdescriptions": [
            {"page": 0, "index": 5, "name": "Clock Tempo", "min": 63, "max": 190, "class": "Global"},
            {"page": 1, "index": 3, "name": "Cutoff"}
        ],
        "midipackets": {
            "SetParam": [
                {"type": "byte", "value": "f0"},
                {"type": "page"},
                {"type": "part"},
                {"type": "index"},
                {"type": "value"},
                {"type": "byte", "value": "f7"}
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_load_schema_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("device.json");
        std::fs::write(&path, SCHEMA)?;

        let schema = DeviceSchema::load(&path).await?;
        assert_eq!(schema.parameters.len(), 2);
        assert_eq!(schema.packets.len(), 1);
        assert!(schema.packets.get("SetParam").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_schema_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = DeviceSchema::load(temp_dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read schema file"));
    }

    #[test]
    fn test_bundled_schema_loads() {
        let schema = DeviceSchema::from_json(include_str!("../schemas/virus_c.json")).unwrap();
        assert_eq!(schema.parameters.len(), 8);
        assert_eq!(schema.parameters.index_by_name("Panorama"), Some(6));
        assert_eq!(
            schema.packets.names().collect::<Vec<_>>(),
            vec!["parameterchange", "requestsingle"]
        );
    }

    #[test]
    fn test_malformed_schema_is_fatal() {
        assert!(DeviceSchema::from_json("{").is_err());
        assert!(DeviceSchema::from_json(r#"{"midipackets": {}}"#).is_err());
        let bad_packet = r#"{"parameterdescriptions": [], "midipackets": {"P": [{"type": "nope"}]}}"#;
        assert!(DeviceSchema::from_json(bad_packet).is_err());
    }
}
