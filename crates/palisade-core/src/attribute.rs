//! Time-bounded facts about system state consumed by policy predicates.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value carried by an attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Signed integer value
    Long(i64),
    /// Text value
    Text(String),
}

impl AttributeValue {
    /// Numeric value, if this is a `Long`.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    fn write_signing_data(&self, out: &mut Vec<u8>) {
        match self {
            Self::Long(value) => out.extend_from_slice(&value.to_be_bytes()),
            Self::Text(text) => out.extend_from_slice(text.as_bytes()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// Attribute identifier, for example `"load.cpu"`.
pub type AttributeId = String;

/// A named value valid over `[valid_from, valid_until)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyAttribute {
    identifier: AttributeId,
    valid_from: Timestamp,
    valid_until: Timestamp,
    value: AttributeValue,
}

impl PolicyAttribute {
    /// Create an attribute.
    pub fn new(
        identifier: impl Into<AttributeId>,
        valid_from: Timestamp,
        valid_until: Timestamp,
        value: AttributeValue,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            valid_from,
            valid_until,
            value,
        }
    }

    /// Numeric attribute.
    pub fn long(
        identifier: impl Into<AttributeId>,
        valid_from: Timestamp,
        valid_until: Timestamp,
        value: i64,
    ) -> Self {
        Self::new(identifier, valid_from, valid_until, AttributeValue::Long(value))
    }

    /// Text attribute.
    pub fn text(
        identifier: impl Into<AttributeId>,
        valid_from: Timestamp,
        valid_until: Timestamp,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            identifier,
            valid_from,
            valid_until,
            AttributeValue::Text(value.into()),
        )
    }

    /// Attribute identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Start of validity.
    pub fn valid_from(&self) -> Timestamp {
        self.valid_from
    }

    /// End of validity.
    pub fn valid_until(&self) -> Timestamp {
        self.valid_until
    }

    /// Current value.
    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// Whether `now` falls inside the validity window.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.valid_from <= now && now < self.valid_until
    }

    /// Canonical bytes: identifier then value.
    pub fn signing_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.identifier.len() + 8);
        self.write_signing_data(&mut out);
        out
    }

    /// Append the canonical bytes to `out`.
    pub fn write_signing_data(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.identifier.as_bytes());
        self.value.write_signing_data(out);
    }
}

/// Attributes keyed by identifier; the latest insert for an identifier wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    entries: BTreeMap<AttributeId, PolicyAttribute>,
}

impl AttributeSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute.
    pub fn insert(&mut self, attribute: PolicyAttribute) -> Option<PolicyAttribute> {
        self.entries
            .insert(attribute.identifier.clone(), attribute)
    }

    /// Attribute by identifier.
    pub fn get(&self, identifier: &str) -> Option<&PolicyAttribute> {
        self.entries.get(identifier)
    }

    /// Drop attributes whose validity ended at or before `now`.
    pub fn retain_valid(&mut self, now: Timestamp) {
        self.entries
            .retain(|_, attribute| now < attribute.valid_until);
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attributes in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &PolicyAttribute> {
        self.entries.values()
    }
}

impl FromIterator<PolicyAttribute> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = PolicyAttribute>>(iter: I) -> Self {
        let mut set = Self::new();
        for attribute in iter {
            set.insert(attribute);
        }
        set
    }
}

impl Extend<PolicyAttribute> for AttributeSet {
    fn extend<I: IntoIterator<Item = PolicyAttribute>>(&mut self, iter: I) {
        for attribute in iter {
            self.insert(attribute);
        }
    }
}
