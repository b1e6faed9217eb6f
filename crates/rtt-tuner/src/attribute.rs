//! Tunable dimensions of the encoded configuration vector.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Selection-probability range of a fresh categorical option.
    pub fn unit() -> Self {
        Self::new(0.0, 1.0)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    pub fn is_within(&self, outer: &Bounds) -> bool {
        self.low >= outer.low && self.high <= outer.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Continuous parameter. Encodes to its own value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumAttribute {
    pub name: String,
    pub range: Bounds,
}

impl NumAttribute {
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            range: Bounds::new(low, high),
        }
    }

    /// Maps a unit draw onto the range.
    pub fn scale(&self, unit: f64) -> f64 {
        unit * self.range.width() + self.range.low
    }

    pub fn random_value<R: Rng>(&self, rng: &mut R) -> f64 {
        self.scale(rng.random::<f64>())
    }
}

/// One labeled option of a categorical parameter, encoded as 0/1.
///
/// `range` starts as `[0, 1]` and is later tightened into selection
/// probability bounds by the narrower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalAttribute {
    pub name: String,
    pub range: Bounds,
    pub category: Value,
    /// Independent toggle (`true`) or member of a one-hot group (`false`).
    pub multi: bool,
}

impl CategoricalAttribute {
    pub fn new(name: impl Into<String>, category: Value, multi: bool) -> Self {
        Self {
            name: name.into(),
            range: Bounds::unit(),
            category,
            multi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Num(NumAttribute),
    Categorical(CategoricalAttribute),
}

impl Attribute {
    /// Parameter name. Shared by every option of a categorical group.
    pub fn name(&self) -> &str {
        match self {
            Self::Num(a) => &a.name,
            Self::Categorical(a) => &a.name,
        }
    }

    /// Identifier of this attribute's position in the encoded vector.
    pub fn dummy_name(&self) -> String {
        match self {
            Self::Num(a) => a.name.clone(),
            Self::Categorical(a) => match &a.category {
                Value::String(label) => label.clone(),
                other => other.to_string(),
            },
        }
    }

    pub fn range(&self) -> &Bounds {
        match self {
            Self::Num(a) => &a.range,
            Self::Categorical(a) => &a.range,
        }
    }

    pub fn range_mut(&mut self) -> &mut Bounds {
        match self {
            Self::Num(a) => &mut a.range,
            Self::Categorical(a) => &mut a.range,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Num(_))
    }

    /// Member of a single-choice group.
    pub fn is_single_choice(&self) -> bool {
        matches!(self, Self::Categorical(a) if !a.multi)
    }
}
