//! Concrete parameter instances bound to a part

use crate::params::{ParamIndex, ParameterDescriptor};
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Stable arena index of an instance inside a [`super::ParameterRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId(pub u32);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One stateful parameter of one part
///
/// The value is stored atomically so instances can be shared with the host;
/// keeping linked instances in step is up to the caller.
#[derive(Debug)]
pub struct ParameterInstance {
    id: ParamId,
    descriptor: Arc<ParameterDescriptor>,
    description_index: u32,
    part: u8,
    uid: u32,
    value: AtomicI32,
}

impl ParameterInstance {
    pub(crate) fn new(
        id: ParamId,
        descriptor: Arc<ParameterDescriptor>,
        description_index: u32,
        part: u8,
        uid: u32,
    ) -> Self {
        let value = AtomicI32::new(descriptor.default_value);
        Self {
            id,
            descriptor,
            description_index,
            part,
            uid,
            value,
        }
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn descriptor(&self) -> &ParameterDescriptor {
        &self.descriptor
    }

    /// Position of the descriptor in the schema, also the flat index within the part
    pub fn description_index(&self) -> u32 {
        self.description_index
    }

    pub fn part(&self) -> u8 {
        self.part
    }

    /// 0 for the canonical instance of a slot, n for the n-th alias
    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn is_public(&self) -> bool {
        self.descriptor.is_public
    }

    pub fn param_index(&self) -> ParamIndex {
        ParamIndex::new(self.descriptor.page, self.part, self.descriptor.index)
    }

    pub fn value(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Store a value clamped to the descriptor range, returning what was stored
    pub fn set_value(&self, value: i32) -> i32 {
        let clamped = self.descriptor.range.clamp(value);
        self.value.store(clamped, Ordering::Relaxed);
        clamped
    }

    pub fn value_text(&self) -> String {
        self.descriptor.value_text(self.value())
    }
}

impl fmt::Display for ParameterInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' [{}] uid:{} = {}",
            self.id,
            self.descriptor.name,
            self.param_index(),
            self.uid,
            self.value_text()
        )
    }
}
