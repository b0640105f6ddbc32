//! Configuration management for synthctl
//!
//! Loads the YAML file naming the schema document and the device model.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Path of the JSON schema document (parameters + midi packets)
    pub schema: String,
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Target device configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_model")]
    pub model: DeviceModel,
    /// Sysex device id (0-127)
    #[serde(default = "default_device_id")]
    pub device_id: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            device_id: default_device_id(),
        }
    }
}

/// Hardware model; decides how many parts the registry is built for
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceModel {
    A,
    B,
    C,
    Snow,
    Ti,
    Ti2,
}

impl DeviceModel {
    pub fn all() -> &'static [DeviceModel] {
        &[
            DeviceModel::A,
            DeviceModel::B,
            DeviceModel::C,
            DeviceModel::Snow,
            DeviceModel::Ti,
            DeviceModel::Ti2,
        ]
    }

    /// Number of addressable parts (MIDI channels)
    pub fn part_count(&self) -> u8 {
        match self {
            DeviceModel::Snow => 4,
            _ => 16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceModel::A => "a",
            DeviceModel::B => "b",
            DeviceModel::C => "c",
            DeviceModel::Snow => "snow",
            DeviceModel::Ti => "ti",
            DeviceModel::Ti2 => "ti2",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        Self::all().iter().copied().find(|m| m.as_str() == lower)
    }
}

impl std::fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents).context("Invalid YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.schema.trim().is_empty() {
            anyhow::bail!("Schema path cannot be empty");
        }
        if self.device.device_id > 127 {
            anyhow::bail!(
                "Invalid device id {} (must be 0-127)",
                self.device.device_id
            );
        }
        Ok(())
    }

    /// Resolve the schema path relative to the directory of the config file
    pub fn schema_path(&self, config_path: impl AsRef<Path>) -> std::path::PathBuf {
        let schema = Path::new(&self.schema);
        if schema.is_absolute() {
            return schema.to_path_buf();
        }
        config_path
            .as_ref()
            .parent()
            .map(|dir| dir.join(schema))
            .unwrap_or_else(|| schema.to_path_buf())
    }
}

// Default value functions
fn default_model() -> DeviceModel { DeviceModel::C }
fn default_device_id() -> u8 { 0x10 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let config = AppConfig::from_yaml(
            r#"
schema: "schemas/virus_c.json"
device:
  model: snow
  device_id: 0
"#,
        )
        .unwrap();
        assert_eq!(config.device.model, DeviceModel::Snow);
        assert_eq!(config.device.model.part_count(), 4);
        assert_eq!(config.device.device_id, 0);
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_yaml("schema: device.json\n").unwrap();
        assert_eq!(config.device.model, DeviceModel::C);
        assert_eq!(config.device.model.part_count(), 16);
        assert_eq!(config.device.device_id, 0x10);
    }

    #[test]
    fn test_validation_errors() {
        assert!(AppConfig::from_yaml("schema: \"\"\n").is_err());
        assert!(AppConfig::from_yaml("schema: a.json\ndevice:\n  device_id: 200\n").is_err());
        assert!(AppConfig::from_yaml("schema: a.json\ndevice:\n  model: z\n").is_err());
    }

    #[test]
    fn test_model_from_str() {
        assert_eq!(DeviceModel::from_str("TI2"), Some(DeviceModel::Ti2));
        assert_eq!(DeviceModel::from_str("snow"), Some(DeviceModel::Snow));
        assert_eq!(DeviceModel::from_str("d"), None);
    }

    #[test]
    fn test_schema_path_relative_to_config() {
        let config = AppConfig::from_yaml("schema: device.json\n").unwrap();
        assert_eq!(
            config.schema_path("/etc/synthctl/synthctl.yaml"),
            Path::new("/etc/synthctl/device.json")
        );
    }

    #[tokio::test]
    async fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("synthctl.yaml");

        let config = AppConfig::from_yaml("schema: device.json\ndevice:\n  model: ti\n")?;
        config.save(&path).await?;

        let loaded = AppConfig::load(&path).await?;
        assert_eq!(loaded.schema, "device.json");
        assert_eq!(loaded.device.model, DeviceModel::Ti);
        Ok(())
    }
}
