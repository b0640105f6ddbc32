//! Parameter key and class-flag types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural key of a parameter slot: which page, which part, which index on the page
///
/// Field order defines the total order (page, then part, then index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamIndex {
    pub page: u8,
    pub part: u8,
    pub index: u8,
}

impl ParamIndex {
    pub fn new(page: u8, part: u8, index: u8) -> Self {
        Self { page, part, index }
    }
}

impl fmt::Display for ParamIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page:{} ch:{} idx:{}",
            self.page,
            self.part as u16 + 1,
            self.index
        )
    }
}

/// Capability flags a descriptor can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterClass {
    /// Device-wide value, shared by every part
    Global,
    /// Belongs to a single instrument/part
    PerInstrument,
    /// Addressed per part on the wire but the device ignores the part
    NonPartSensitive,
    /// Part of a multi/performance patch rather than a single sound
    Performance,
}

impl ParameterClass {
    pub fn all() -> &'static [ParameterClass] {
        &[
            ParameterClass::Global,
            ParameterClass::PerInstrument,
            ParameterClass::NonPartSensitive,
            ParameterClass::Performance,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterClass::Global => "Global",
            ParameterClass::PerInstrument => "PerInstrument",
            ParameterClass::NonPartSensitive => "NonPartSensitive",
            ParameterClass::Performance => "Performance",
        }
    }

    /// Parse a single flag name (exact match)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == name)
    }

    fn bit(self) -> u8 {
        match self {
            ParameterClass::Global => 1 << 0,
            ParameterClass::PerInstrument => 1 << 1,
            ParameterClass::NonPartSensitive => 1 << 2,
            ParameterClass::Performance => 1 << 3,
        }
    }
}

impl fmt::Display for ParameterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of [`ParameterClass`] flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ParameterClasses(u8);

impl ParameterClasses {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, class: ParameterClass) -> Self {
        self.insert(class);
        self
    }

    pub fn insert(&mut self, class: ParameterClass) {
        self.0 |= class.bit();
    }

    pub fn contains(&self, class: ParameterClass) -> bool {
        self.0 & class.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Global or NonPartSensitive: one instance serves every part
    pub fn is_part_shared(&self) -> bool {
        self.contains(ParameterClass::Global) || self.contains(ParameterClass::NonPartSensitive)
    }

    pub fn iter(&self) -> impl Iterator<Item = ParameterClass> {
        let classes = *self;
        ParameterClass::all()
            .iter()
            .copied()
            .filter(move |c| classes.contains(*c))
    }

    /// Parse a `|`-separated list such as `"Global|Performance"`
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut classes = Self::empty();
        for name in text.split('|').map(str::trim).filter(|s| !s.is_empty()) {
            let class = ParameterClass::from_name(name)
                .ok_or_else(|| format!("unknown parameter class '{}'", name))?;
            classes.insert(class);
        }
        Ok(classes)
    }
}

impl FromIterator<ParameterClass> for ParameterClasses {
    fn from_iter<T: IntoIterator<Item = ParameterClass>>(iter: T) -> Self {
        let mut classes = Self::empty();
        for class in iter {
            classes.insert(class);
        }
        classes
    }
}

impl fmt::Display for ParameterClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|c| c.as_str()).collect();
        f.write_str(&names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_param_index_ordering() {
        let mut set = BTreeSet::new();
        set.insert(ParamIndex::new(1, 0, 0));
        set.insert(ParamIndex::new(0, 1, 0));
        set.insert(ParamIndex::new(0, 0, 9));
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(
            ordered,
            vec![
                ParamIndex::new(0, 0, 9),
                ParamIndex::new(0, 1, 0),
                ParamIndex::new(1, 0, 0),
            ]
        );
    }

    #[test]
    fn test_param_index_display() {
        assert_eq!(ParamIndex::new(1, 0, 3).to_string(), "page:1 ch:1 idx:3");
        assert_eq!(
            ParamIndex::new(255, 255, 255).to_string(),
            "page:255 ch:256 idx:255"
        );
    }

    #[test]
    fn test_parse_classes() {
        let classes = ParameterClasses::parse("Global|Performance").unwrap();
        assert!(classes.contains(ParameterClass::Global));
        assert!(classes.contains(ParameterClass::Performance));
        assert!(!classes.contains(ParameterClass::NonPartSensitive));
        assert!(classes.is_part_shared());
        assert_eq!(classes.to_string(), "Global|Performance");

        assert!(ParameterClasses::parse("").unwrap().is_empty());
        assert!(ParameterClasses::parse("Global|Bogus").is_err());
    }

    #[test]
    fn test_part_shared() {
        assert!(ParameterClasses::empty()
            .with(ParameterClass::NonPartSensitive)
            .is_part_shared());
        assert!(!ParameterClasses::empty()
            .with(ParameterClass::PerInstrument)
            .is_part_shared());
    }
}
