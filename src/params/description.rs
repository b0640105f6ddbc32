//! Parameter descriptions loaded from the device schema
//!
//! A [`ParameterDescriptionSet`] is built once from the `parameterdescriptions`
//! and `valuelists` sections of a schema document and never mutated afterwards.

use super::types::{ParameterClass, ParameterClasses};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Inclusive value range of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange {
    pub min: i32,
    pub max: i32,
}

impl ValueRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min, self.max)
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self { min: 0, max: 127 }
    }
}

/// One immutable schema entry
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub page: u8,
    pub index: u8,
    pub name: String,
    pub classes: ParameterClasses,
    pub is_public: bool,
    pub is_discrete: bool,
    pub is_bool: bool,
    pub range: ValueRange,
    pub default_value: i32,
    /// Display strings indexed by `value - range.min`
    pub value_list: Option<Arc<Vec<String>>>,
}

impl ParameterDescriptor {
    /// Public, per-part descriptor with a 0..127 range
    pub fn new(page: u8, index: u8, name: impl Into<String>) -> Self {
        Self {
            page,
            index,
            name: name.into(),
            classes: ParameterClasses::empty(),
            is_public: true,
            is_discrete: false,
            is_bool: false,
            range: ValueRange::default(),
            default_value: 0,
            value_list: None,
        }
    }

    pub fn with_class(mut self, class: ParameterClass) -> Self {
        self.classes.insert(class);
        self
    }

    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn with_range(mut self, min: i32, max: i32) -> Self {
        self.range = ValueRange::new(min, max);
        self.default_value = self.range.clamp(self.default_value);
        self
    }

    /// Global or NonPartSensitive
    pub fn is_part_shared(&self) -> bool {
        self.classes.is_part_shared()
    }

    /// Value as carried in a sysex data field
    ///
    /// Ranges starting below zero are sent offset by `-min`, others as-is.
    /// `None` when the clamped value does not fit a 16-bit field.
    pub fn to_wire(&self, value: i32) -> Option<u16> {
        let value = self.range.clamp(value) as i64;
        u16::try_from(value - self.wire_offset()).ok()
    }

    /// Inverse of [`Self::to_wire`], clamped to the range
    pub fn from_wire(&self, wire: u16) -> i32 {
        let value = wire as i64 + self.wire_offset();
        self.range.clamp(value.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }

    /// Whether every value of the range can be carried in a 16-bit field
    pub fn is_wire_encodable(&self) -> bool {
        self.to_wire(self.range.min).is_some() && self.to_wire(self.range.max).is_some()
    }

    fn wire_offset(&self) -> i64 {
        if self.range.min < 0 {
            self.range.min as i64
        } else {
            0
        }
    }

    /// Human readable text for a raw value
    pub fn value_text(&self, value: i32) -> String {
        if let Some(list) = &self.value_list {
            let offset = value - self.range.min;
            if offset >= 0 {
                if let Some(text) = list.get(offset as usize) {
                    return text.clone();
                }
            }
        }
        if self.is_bool {
            return if value != 0 { "On" } else { "Off" }.to_string();
        }
        value.to_string()
    }
}

/// Raw descriptor as found in the schema JSON
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    page: u8,
    index: u8,
    name: String,
    #[serde(default)]
    min: i32,
    #[serde(default = "default_max")]
    max: i32,
    #[serde(default)]
    default: Option<i32>,
    #[serde(default = "default_true")]
    is_public: bool,
    #[serde(default)]
    is_discrete: bool,
    #[serde(default)]
    is_bool: bool,
    #[serde(default)]
    class: String,
    #[serde(default)]
    to_text: Option<String>,
}

/// Parameter-related sections of a schema document
#[derive(Debug, Deserialize)]
struct RawParameterSections {
    #[serde(rename = "parameterdescriptions")]
    descriptions: Vec<RawDescriptor>,
    #[serde(default, rename = "valuelists")]
    value_lists: HashMap<String, Vec<String>>,
}

/// Ordered descriptor list plus name lookup
#[derive(Debug, Clone, Default)]
pub struct ParameterDescriptionSet {
    descriptions: Vec<Arc<ParameterDescriptor>>,
    name_to_index: HashMap<String, u32>,
}

impl ParameterDescriptionSet {
    /// Parse the `parameterdescriptions`/`valuelists` sections of a schema document
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawParameterSections =
            serde_json::from_str(json).context("Failed to parse parameter descriptions")?;

        let value_lists: HashMap<String, Arc<Vec<String>>> = raw
            .value_lists
            .into_iter()
            .map(|(name, values)| (name, Arc::new(values)))
            .collect();

        let mut descriptors = Vec::with_capacity(raw.descriptions.len());
        for (position, desc) in raw.descriptions.into_iter().enumerate() {
            let descriptor = Self::convert(desc, &value_lists)
                .with_context(|| format!("Invalid parameter description #{}", position))?;
            descriptors.push(descriptor);
        }

        let set = Self::from_descriptors(descriptors)?;
        info!(
            "Loaded {} parameter descriptions ({} value lists)",
            set.len(),
            value_lists.len()
        );
        Ok(set)
    }

    /// Build a set from already constructed descriptors, validating names and ranges
    pub fn from_descriptors(descriptors: Vec<ParameterDescriptor>) -> Result<Self> {
        let mut name_to_index = HashMap::with_capacity(descriptors.len());

        for (i, desc) in descriptors.iter().enumerate() {
            if desc.name.is_empty() {
                anyhow::bail!("Parameter description #{} has an empty name", i);
            }
            if desc.range.min > desc.range.max {
                anyhow::bail!(
                    "Parameter '{}' has min {} greater than max {}",
                    desc.name,
                    desc.range.min,
                    desc.range.max
                );
            }
            if !desc.is_wire_encodable() {
                anyhow::bail!(
                    "Parameter '{}' range {}..={} does not fit a 16-bit sysex value",
                    desc.name,
                    desc.range.min,
                    desc.range.max
                );
            }
            if !desc.range.contains(desc.default_value) {
                anyhow::bail!(
                    "Parameter '{}' default {} is outside {}..={}",
                    desc.name,
                    desc.default_value,
                    desc.range.min,
                    desc.range.max
                );
            }
            if name_to_index.insert(desc.name.clone(), i as u32).is_some() {
                anyhow::bail!("Duplicate parameter name '{}'", desc.name);
            }
            debug!(
                "Parameter #{} '{}' page {} index {} [{}]",
                i, desc.name, desc.page, desc.index, desc.classes
            );
        }

        Ok(Self {
            descriptions: descriptors.into_iter().map(Arc::new).collect(),
            name_to_index,
        })
    }

    fn convert(
        raw: RawDescriptor,
        value_lists: &HashMap<String, Arc<Vec<String>>>,
    ) -> Result<ParameterDescriptor> {
        let classes = ParameterClasses::parse(&raw.class)
            .map_err(|e| anyhow::anyhow!("Parameter '{}': {}", raw.name, e))?;

        let value_list = match &raw.to_text {
            Some(list_name) => Some(
                value_lists
                    .get(list_name)
                    .cloned()
                    .with_context(|| {
                        format!("Parameter '{}' references unknown value list '{}'", raw.name, list_name)
                    })?,
            ),
            None => None,
        };

        Ok(ParameterDescriptor {
            page: raw.page,
            index: raw.index,
            classes,
            is_public: raw.is_public,
            is_discrete: raw.is_discrete,
            is_bool: raw.is_bool,
            range: ValueRange::new(raw.min, raw.max),
            default_value: raw.default.unwrap_or(raw.min),
            value_list,
            name: raw.name,
        })
    }

    pub fn descriptions(&self) -> &[Arc<ParameterDescriptor>] {
        &self.descriptions
    }

    pub fn get(&self, index: u32) -> Option<&Arc<ParameterDescriptor>> {
        self.descriptions.get(index as usize)
    }

    /// Exact, case-sensitive name lookup
    pub fn index_by_name(&self, name: &str) -> Option<u32> {
        self.name_to_index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

fn default_max() -> i32 { 127 }
fn default_true() -> bool { true }
