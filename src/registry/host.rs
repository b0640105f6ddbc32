//! Hand-off of public parameters to the host application
//!
//! The host owns every public [`ParameterInstance`]; the registry only keeps
//! weak references to them.

use super::instance::ParameterInstance;
use std::sync::Arc;

/// Identifier and display name of the group holding part-shared parameters
pub const GLOBAL_GROUP_ID: &str = "global";
const GLOBAL_GROUP_NAME: &str = "Global";

/// A named set of public parameters (one per part, plus one global group)
#[derive(Debug, Clone)]
pub struct ParameterGroup {
    pub id: String,
    pub name: String,
    pub parameters: Vec<Arc<ParameterInstance>>,
}

impl ParameterGroup {
    /// Group for a 0-based part, presented 1-based (`ch1`, `Ch 1`)
    pub fn for_part(part: u8) -> Self {
        let number = part as u32 + 1;
        Self {
            id: format!("ch{}", number),
            name: format!("Ch {}", number),
            parameters: Vec::new(),
        }
    }

    pub fn global() -> Self {
        Self {
            id: GLOBAL_GROUP_ID.to_string(),
            name: GLOBAL_GROUP_NAME.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn add_child(&mut self, parameter: Arc<ParameterInstance>) {
        self.parameters.push(parameter);
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// External owner of public parameters (GUI / plugin host)
pub trait ParameterHost {
    /// Take ownership of a group of public parameters
    fn add_parameter_group(&mut self, group: ParameterGroup);
}

/// In-memory host that simply keeps the groups it receives
#[derive(Debug, Default)]
pub struct ParameterGroupStore {
    groups: Vec<ParameterGroup>,
}

impl ParameterGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[ParameterGroup] {
        &self.groups
    }

    pub fn group(&self, id: &str) -> Option<&ParameterGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Number of parameters held across all groups
    pub fn parameter_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    /// Release every group (and with it every public parameter)
    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

impl ParameterHost for ParameterGroupStore {
    fn add_parameter_group(&mut self, group: ParameterGroup) {
        self.groups.push(group);
    }
}
