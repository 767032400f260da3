//! Sweep axes and the parameter space they span.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ps_types::{ConfigError, JobDescriptor, ParameterValue, SweepResult};

use crate::trial::TrialEnumerator;

const START_SUFFIX: &str = "_start";
const END_SUFFIX: &str = "_end";
const COUNT_SUFFIX: &str = "_n";

/// Upper bound on the number of trials in one sweep, and so on any axis' sample count.
pub const MAX_TRIALS: usize = 1_000_000;

/// Names that collide with lookup table entry keys.
pub const RESERVED_AXIS_NAMES: [&str; 2] = ["status", "updated_at"];

/// A single swept parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub start: ParameterValue,
    /// `None` fixes the axis at `start`.
    pub end: Option<ParameterValue>,
    /// Number of samples between `start` and `end`, inclusive. Ignored without `end`.
    pub count: usize,
}

impl Axis {
    pub fn fixed(name: impl Into<String>, start: impl Into<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: None,
            count: 1,
        }
    }

    pub fn range(
        name: impl Into<String>,
        start: impl Into<ParameterValue>,
        end: impl Into<ParameterValue>,
        count: usize,
    ) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: Some(end.into()),
            count,
        }
    }

    /// Evenly spaced samples from `start` to `end` inclusive, cast to the type of `start`.
    ///
    /// The endpoints are exact; only interior samples are interpolated in `f64`.
    pub fn values(&self) -> Vec<ParameterValue> {
        let end = match self.end {
            Some(end) if self.count > 1 => end,
            _ => return vec![self.start],
        };

        let last_value = match (self.start, end) {
            (ParameterValue::Int(_), ParameterValue::Int(_)) => end,
            _ => self.start.cast_like(end.as_f64()),
        };

        let low = self.start.as_f64();
        let high = end.as_f64();
        let last = self.count - 1;
        (0..self.count)
            .map(|i| match i {
                0 => self.start,
                i if i == last => last_value,
                i => self.start.cast_like(low + (high - low) * i as f64 / last as f64),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        if self.end.is_some() {
            self.count.max(1)
        } else {
            1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The full parameter space: axes in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub axes: Vec<Axis>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self { axes: Vec::new() }
    }

    pub fn add_fixed(mut self, name: impl Into<String>, start: impl Into<ParameterValue>) -> Self {
        self.axes.push(Axis::fixed(name, start));
        self
    }

    pub fn add_range(
        mut self,
        name: impl Into<String>,
        start: impl Into<ParameterValue>,
        end: impl Into<ParameterValue>,
        count: usize,
    ) -> Self {
        self.axes.push(Axis::range(name, start, end, count));
        self
    }

    /// Parse the `<p>_start` / `<p>_end` / `<p>_n` triples of a sweep descriptor.
    ///
    /// Axes are ordered by the position of their `_start` field. `_end` and `_n`
    /// fields without a matching `_start` are ignored.
    pub fn from_descriptor(descriptor: &JobDescriptor) -> SweepResult<Self> {
        let mut space = Self::new();

        for key in descriptor.keys() {
            let Some(name) = key.strip_suffix(START_SUFFIX) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            if RESERVED_AXIS_NAMES.contains(&name) {
                return Err(ConfigError::ReservedName {
                    parameter: name.to_string(),
                }
                .into());
            }

            let start = numeric_field(descriptor, key)?.ok_or_else(|| ConfigError::NonNumeric {
                field: key.to_string(),
                value: "null".to_string(),
            })?;

            let end_key = format!("{name}{END_SUFFIX}");
            let axis = match numeric_field(descriptor, &end_key)? {
                None => Axis::fixed(name, start),
                Some(end) => {
                    let count_key = format!("{name}{COUNT_SUFFIX}");
                    let raw = descriptor.value(&count_key).ok_or_else(|| {
                        ConfigError::MissingSampleCount {
                            parameter: name.to_string(),
                        }
                    })?;
                    Axis::range(name, start, end, sample_count(name, raw)?)
                }
            };

            tracing::debug!(axis = %axis.name, samples = axis.len(), "parsed sweep axis");
            space.axes.push(axis);
        }

        space.checked_trial_count()?;
        Ok(space)
    }

    pub fn names(&self) -> Vec<&str> {
        self.axes.iter().map(|a| a.name.as_str()).collect()
    }

    /// Enumerated values of every axis, in axis order.
    pub fn value_sets(&self) -> Vec<(String, Vec<ParameterValue>)> {
        self.axes
            .iter()
            .map(|a| (a.name.clone(), a.values()))
            .collect()
    }

    /// Number of trials in the Cartesian product, `None` on overflow.
    pub fn trial_count(&self) -> Option<usize> {
        self.axes
            .iter()
            .try_fold(1usize, |total, axis| total.checked_mul(axis.len()))
    }

    /// Number of trials, or a configuration error past [`MAX_TRIALS`].
    pub fn checked_trial_count(&self) -> SweepResult<usize> {
        self.trial_count()
            .filter(|&n| n <= MAX_TRIALS)
            .ok_or_else(|| ConfigError::TooManyTrials { limit: MAX_TRIALS }.into())
    }

    pub fn enumerate(&self) -> TrialEnumerator {
        TrialEnumerator::new(self.value_sets())
    }
}

fn numeric_field(descriptor: &JobDescriptor, field: &str) -> SweepResult<Option<ParameterValue>> {
    match descriptor.value(field) {
        None => Ok(None),
        Some(value) => ParameterValue::from_json(value).map(Some).ok_or_else(|| {
            ConfigError::NonNumeric {
                field: field.to_string(),
                value: value.to_string(),
            }
            .into()
        }),
    }
}

fn sample_count(name: &str, raw: &Value) -> SweepResult<usize> {
    let count = match raw {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    };

    match count {
        Some(c) if c > MAX_TRIALS as u64 => Err(ConfigError::TooManyTrials { limit: MAX_TRIALS }.into()),
        Some(c) if c >= 1 => Ok(c as usize),
        _ => Err(ConfigError::InvalidSampleCount {
            parameter: name.to_string(),
            value: raw.to_string(),
        }
        .into()),
    }
}
