//! Trials, their enumeration order, and their identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use ps_types::ParameterValue;

/// Namespace under which trial identifiers are derived. Never change it:
/// every persisted lookup table is keyed by ids under this namespace.
const TRIAL_NAMESPACE: Uuid = Uuid::from_u128(0x6d1c_3a4e_2f7b_5c80_9e41_b2d7_0a63_f5c9);

/// Deterministic, content-derived trial identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialId(Uuid);

impl TrialId {
    /// UUIDv5 of the canonical JSON form of the ordered `(name, value)` pairs.
    pub fn from_parameters(parameters: &[(String, ParameterValue)]) -> Self {
        let canonical = Value::Array(
            parameters
                .iter()
                .map(|(name, value)| Value::Array(vec![Value::from(name.as_str()), value.to_json()]))
                .collect(),
        )
        .to_string();
        Self(Uuid::new_v5(&TRIAL_NAMESPACE, canonical.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TrialId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One combination of axis values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Position in the enumeration order.
    pub index: usize,
    pub id: TrialId,
    pub parameters: Vec<(String, ParameterValue)>,
}

impl Trial {
    pub fn new(index: usize, parameters: Vec<(String, ParameterValue)>) -> Self {
        let id = TrialId::from_parameters(&parameters);
        Self {
            index,
            id,
            parameters,
        }
    }

    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Parameter values as a JSON object, in axis order.
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.parameters
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }

    /// True for the single trial of a sweep without axes.
    pub fn is_base(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Lazy Cartesian product over axis value lists.
///
/// The first axis varies slowest and the last fastest. A space without axes
/// yields exactly one trial with no parameters.
#[derive(Debug, Clone)]
pub struct TrialEnumerator {
    sets: Vec<(String, Vec<ParameterValue>)>,
    cursor: usize,
    total: usize,
}

impl TrialEnumerator {
    pub fn new(sets: Vec<(String, Vec<ParameterValue>)>) -> Self {
        let total = sets
            .iter()
            .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()))
            .unwrap_or(usize::MAX);
        Self {
            sets,
            cursor: 0,
            total,
        }
    }

    /// Total number of trials, independent of the cursor.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Restart from the first trial.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Trial at a given position in the enumeration order.
    pub fn nth_trial(&self, index: usize) -> Option<Trial> {
        if index >= self.total {
            return None;
        }

        let mut parameters = Vec::with_capacity(self.sets.len());
        let mut rest = index;
        for (name, values) in self.sets.iter().rev() {
            parameters.push((name.clone(), values[rest % values.len()]));
            rest /= values.len();
        }
        parameters.reverse();

        Some(Trial::new(index, parameters))
    }
}

impl Iterator for TrialEnumerator {
    type Item = Trial;

    fn next(&mut self) -> Option<Trial> {
        let trial = self.nth_trial(self.cursor)?;
        self.cursor += 1;
        Some(trial)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total.saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TrialEnumerator {}
