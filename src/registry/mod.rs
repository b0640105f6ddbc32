//! ParameterRegistry - parameter instances of every part, indexed by key and position
//!
//! Built once per device model from a [`ParameterDescriptionSet`]:
//!
//! - every descriptor is instantiated for every part, except Global and
//!   NonPartSensitive descriptors which only exist once (part 0)
//! - descriptors sharing a `(page, index)` slot produce uid-numbered aliases that
//!   are linked to each other
//! - public instances are handed to the [`ParameterHost`] and only weakly
//!   referenced here, internal ones are owned by the registry
//!
//! After [`ParameterRegistry::build`] returns, the layout never changes; a new
//! device model means a new registry.

pub mod host;
pub mod instance;


pub use host::{ParameterGroup, ParameterGroupStore, ParameterHost, GLOBAL_GROUP_ID};
pub use instance::{ParamId, ParameterInstance};

use crate::midi::MAX_PARTS;
use crate::params::{ParamIndex, ParameterDescriptionSet};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Ownership regime of an arena entry
#[derive(Debug)]
enum Slot {
    /// Owned by the host, only observed here
    External(Weak<ParameterInstance>),
    /// Owned by the registry for its whole lifetime
    Owned(Arc<ParameterInstance>),
}

type ParameterList = Vec<ParamId>;

/// Parameter instances of all parts of one device model
#[derive(Debug)]
pub struct ParameterRegistry {
    part_count: u8,
    slots: Vec<Slot>,
    /// Adjacency list indexed by `ParamId`
    links: Vec<ParameterList>,
    public_params: BTreeMap<ParamIndex, ParameterList>,
    internal_params: BTreeMap<ParamIndex, ParameterList>,
    /// Per part, one entry per descriptor in schema order
    params_by_part: Vec<ParameterList>,
}

impl ParameterRegistry {
    /// Instantiate every descriptor for `part_count` parts and hand public ones to `host`
    ///
    /// Groups reach the host in part order, followed by the global group.
    pub fn build(
        descriptions: &ParameterDescriptionSet,
        part_count: u8,
        host: &mut dyn ParameterHost,
    ) -> Self {
        debug_assert!(part_count <= MAX_PARTS, "part count {} exceeds {}", part_count, MAX_PARTS);

        let mut registry = Self {
            part_count,
            slots: Vec::new(),
            links: Vec::new(),
            public_params: BTreeMap::new(),
            internal_params: BTreeMap::new(),
            params_by_part: Vec::with_capacity(part_count as usize),
        };

        let mut global_group = ParameterGroup::global();
        // Every instance built so far per slot; its length is the next uid
        let mut known_slots: HashMap<ParamIndex, ParameterList> = HashMap::new();

        for part in 0..part_count {
            let mut group = ParameterGroup::for_part(part);
            let mut flat = Vec::with_capacity(descriptions.len());

            for (position, desc) in descriptions.descriptions().iter().enumerate() {
                let is_part_shared = desc.is_part_shared();

                if is_part_shared && part != 0 {
                    // only instantiated on the first part, later parts see that one
                    flat.push(registry.params_by_part[0][position]);
                    continue;
                }

                let idx = ParamIndex::new(desc.page, part, desc.index);
                let siblings = known_slots.entry(idx).or_default();
                let uid = siblings.len() as u32;

                let id = ParamId(registry.slots.len() as u32);
                let instance = Arc::new(ParameterInstance::new(
                    id,
                    Arc::clone(desc),
                    position as u32,
                    part,
                    uid,
                ));

                registry.links.push(Vec::new());
                if uid > 0 {
                    for &existing in siblings.iter() {
                        registry.links[existing.0 as usize].push(id);
                        registry.links[id.0 as usize].push(existing);
                    }
                    debug!("Linked '{}' uid {} at [{}] to {} earlier instance(s)", desc.name, uid, idx, siblings.len());
                }
                siblings.push(id);
                flat.push(id);

                if desc.is_public {
                    registry.public_params.entry(idx).or_default().push(id);
                    registry.slots.push(Slot::External(Arc::downgrade(&instance)));
                    if is_part_shared {
                        global_group.add_child(instance);
                    } else {
                        group.add_child(instance);
                    }
                } else {
                    registry.internal_params.entry(idx).or_default().push(id);
                    registry.slots.push(Slot::Owned(instance));
                }
            }

            registry.params_by_part.push(flat);
            host.add_parameter_group(group);
        }
        host.add_parameter_group(global_group);

        info!(
            "Registered {} parameter instances for {} parts ({} public slots, {} internal slots)",
            registry.slots.len(),
            part_count,
            registry.public_params.len(),
            registry.internal_params.len()
        );

        registry
    }

    pub fn part_count(&self) -> u8 {
        self.part_count
    }

    /// Number of distinct instances built
    pub fn instance_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of entries in a part's flat table
    pub fn parameter_count(&self, part: u8) -> usize {
        self.params_by_part
            .get(part as usize)
            .map(|params| params.len())
            .unwrap_or(0)
    }

    /// Instances at a structural key: public ones if any, else internal ones, else empty
    pub fn find_synth_param(&self, idx: ParamIndex) -> &[ParamId] {
        if let Some(params) = self.public_params.get(&idx) {
            return params;
        }
        self.internal_params
            .get(&idx)
            .map(|params| params.as_slice())
            .unwrap_or(&[])
    }

    pub fn find_synth_param_at(&self, part: u8, page: u8, index: u8) -> &[ParamId] {
        self.find_synth_param(ParamIndex::new(page, part, index))
    }

    /// Resolved instances at a structural key
    pub fn instances_at(&self, idx: ParamIndex) -> Vec<Arc<ParameterInstance>> {
        self.find_synth_param(idx)
            .iter()
            .filter_map(|id| self.instance(*id))
            .collect()
    }

    /// Id at a flat position of a part; out-of-range part or index gives `None`
    pub fn parameter_id(&self, index: u32, part: u8) -> Option<ParamId> {
        self.params_by_part
            .get(part as usize)?
            .get(index as usize)
            .copied()
    }

    /// Instance at a flat position of a part
    pub fn get_parameter(&self, index: u32, part: u8) -> Option<Arc<ParameterInstance>> {
        self.parameter_id(index, part).and_then(|id| self.instance(id))
    }

    /// Resolve an id; `None` if unknown or if the host already released it
    pub fn instance(&self, id: ParamId) -> Option<Arc<ParameterInstance>> {
        match self.slots.get(id.0 as usize)? {
            Slot::External(weak) => weak.upgrade(),
            Slot::Owned(instance) => Some(Arc::clone(instance)),
        }
    }

    /// Whether the registry owns this instance (as opposed to the host)
    pub fn is_owned(&self, id: ParamId) -> bool {
        matches!(self.slots.get(id.0 as usize), Some(Slot::Owned(_)))
    }

    /// Other instances that must mirror this one's value
    pub fn linked_parameters(&self, id: ParamId) -> &[ParamId] {
        self.links
            .get(id.0 as usize)
            .map(|links| links.as_slice())
            .unwrap_or(&[])
    }

    /// Instances owned by the registry, in construction order
    pub fn internal_instances(&self) -> impl Iterator<Item = &Arc<ParameterInstance>> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Owned(instance) => Some(instance),
            Slot::External(_) => None,
        })
    }
}
