use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A single candidate value of a tunable parameter.
///
/// Values are kept in the JSON shape they were written in so that an exported
/// space document reads the same as the one that was loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn text(s: impl Into<String>) -> Self {
        ParamValue::Text(s.into())
    }

    /// The string form handed to the external tool.
    pub fn as_arg(&self) -> String {
        self.to_string()
    }
}

// Floats compare by bit pattern so values can key the usage counters.
impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Float(a), ParamValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ParamValue::Text(a), ParamValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ParamValue::Int(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            ParamValue::Float(v) => {
                1u8.hash(state);
                v.to_bits().hash(state);
            }
            ParamValue::Text(v) => {
                2u8.hash(state);
                v.hash(state);
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// How one option is passed to the search procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSetting {
    /// On-off option written without a value.
    Flag,
    Single(ParamValue),
    /// Option repeated once per value. Duplicates are meaningful.
    Many(Vec<ParamValue>),
}

impl ParamSetting {
    /// Values in emission order; a flag yields `None` once.
    pub fn values(&self) -> Vec<Option<&ParamValue>> {
        match self {
            ParamSetting::Flag => vec![None],
            ParamSetting::Single(v) => vec![Some(v)],
            ParamSetting::Many(vs) => vs.iter().map(Some).collect(),
        }
    }
}

impl From<Option<ParamValue>> for ParamSetting {
    fn from(v: Option<ParamValue>) -> Self {
        match v {
            Some(v) => ParamSetting::Single(v),
            None => ParamSetting::Flag,
        }
    }
}

/// Flat option set handed to a search procedure.
pub type Parameters = BTreeMap<String, ParamSetting>;

/// Values drawn from the tuning space in one round, per parameter.
pub type Draw = BTreeMap<String, Vec<ParamValue>>;
