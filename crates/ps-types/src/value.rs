use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A concrete numeric parameter value.
///
/// The variant is the parameter's type: values sampled along an axis are cast
/// to the variant of the axis start, and `Int(1)` and `Float(1.0)` are distinct
/// trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    /// Read a numeric JSON value. Booleans, strings and nulls are rejected.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            _ => None,
        }
    }

    pub fn to_json(self) -> Value {
        match self {
            Self::Int(v) => Value::from(v),
            Self::Float(v) => Value::from(v),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Cast a raw sample to the same variant as `self`. Integers truncate toward zero.
    pub fn cast_like(self, sample: f64) -> Self {
        match self {
            Self::Int(_) => Self::Int(sample.trunc() as i64),
            Self::Float(_) => Self::Float(sample),
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}
