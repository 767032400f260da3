//! # ps-space
//!
//! Parameter space definitions for a sweep: axes parsed from a sweep
//! descriptor, the ordered Cartesian product of their values, and the
//! content-derived identifier of each resulting trial.

mod space;
mod trial;

pub use space::{Axis, ParameterSpace, MAX_TRIALS, RESERVED_AXIS_NAMES};
pub use trial::{Trial, TrialEnumerator, TrialId};
