//! Domain specification grammar and the tuned-domain report.
//!
//! A [`DomainSpec`] is an ordered list of parameters, each carrying a
//! [`RawDomain`]. Insertion order is significant: it fixes the layout of the
//! encoded vectors built from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::ConfigError;

/// The value domain of one tunable parameter, as written by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawDomain {
    /// Fixed tuple of labels: a single-choice categorical group.
    Tuple(Vec<Value>),
    /// Either `[low, high]` numbers or a list of string/boolean labels
    /// (multi-choice categorical group).
    List(Vec<Value>),
    /// Unordered collection. Not a supported domain.
    Set(Vec<Value>),
    /// Any other value. Not a supported domain.
    Scalar(Value),
}

impl RawDomain {
    /// Interpret a JSON value: arrays are lists, `{"tuple": [...]}` is a
    /// tuple, `{"set": [...]}` is a set, everything else is a scalar.
    pub fn from_json(value: Value) -> Self {
        if let Value::Array(items) = value {
            return Self::List(items);
        }
        if let Some(items) = tagged_array(&value, "tuple") {
            return Self::Tuple(items);
        }
        if let Some(items) = tagged_array(&value, "set") {
            return Self::Set(items);
        }
        Self::Scalar(value)
    }
}

fn tagged_array(value: &Value, tag: &str) -> Option<Vec<Value>> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(tag)?.as_array().cloned()
}

/// Ordered domain specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    entries: Vec<(String, RawDomain)>,
}

impl DomainSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, domain: RawDomain) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = domain,
            None => self.entries.push((name, domain)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, domain: RawDomain) -> Self {
        self.insert(name, domain);
        self
    }

    /// Continuous parameter on `[low, high]`.
    pub fn numeric(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.with(name, RawDomain::List(vec![Value::from(low), Value::from(high)]))
    }

    /// Single-choice categorical parameter.
    pub fn one_of<I, V>(self, name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(
            name,
            RawDomain::Tuple(labels.into_iter().map(Into::into).collect()),
        )
    }

    /// Multi-choice categorical parameter.
    pub fn any_of<I, V>(self, name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(
            name,
            RawDomain::List(labels.into_iter().map(Into::into).collect()),
        )
    }

    /// Build from a JSON object, keeping the document's key order.
    pub fn from_json(value: Value) -> Result<Self, ConfigError> {
        let Value::Object(map) = value else {
            return Err(crate::config_error!(
                "value_domains",
                "domain specification must be a JSON object"
            ));
        };
        let mut spec = Self::new();
        for (name, raw) in map {
            spec.insert(name, RawDomain::from_json(raw));
        }
        Ok(spec)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            crate::config_error!("value_domains", "invalid JSON: {}", e)
        })?;
        Self::from_json(value)
    }

    pub fn get(&self, name: &str) -> Option<&RawDomain> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawDomain)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Three-way split of a categorical group's options after tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPartition {
    /// Options whose selection lower bound reached 0.5.
    pub included: Vec<Value>,
    /// Options whose selection upper bound dropped to 0.5.
    pub excluded: Vec<Value>,
    pub undecided: Vec<Value>,
}

impl CategoryPartition {
    pub fn is_included(&self, label: &Value) -> bool {
        self.included.contains(label)
    }

    pub fn is_excluded(&self, label: &Value) -> bool {
        self.excluded.contains(label)
    }

    pub fn len(&self) -> usize {
        self.included.len() + self.excluded.len() + self.undecided.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Final domain of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainReport {
    Numeric { low: f64, high: f64 },
    Categorical(CategoryPartition),
}

impl DomainReport {
    pub fn as_numeric(&self) -> Option<(f64, f64)> {
        match self {
            Self::Numeric { low, high } => Some((*low, *high)),
            Self::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&CategoryPartition> {
        match self {
            Self::Categorical(partition) => Some(partition),
            Self::Numeric { .. } => None,
        }
    }
}

/// Tuning result: parameter name to its final domain.
pub type TunedDomains = BTreeMap<String, DomainReport>;
