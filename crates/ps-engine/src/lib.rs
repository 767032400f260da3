//! # ps-engine
//!
//! Orchestration for parameter sweeps.
//!
//! Reads a sweep descriptor, expands it into trials, writes one data artifact
//! and job descriptor per trial, and runs a worker on each trial until the
//! lookup table records every trial as complete. Interrupted sweeps resume
//! from the lookup table and the artifacts already on disk.

mod container;
mod dispatch;
mod driver;
mod materializer;
mod params;

pub use container::{DataContainer, FileCopyContainer};
pub use dispatch::{
    RegistryDispatcher, SubprocessDispatcher, WorkerCommand, WorkerDispatcher, WorkerFn,
    WorkerRegistry, PYTHON_ENV,
};
pub use driver::{RunMode, SweepDriver, SweepSummary};
pub use materializer::{Materialized, TrialMaterializer};
pub use params::SweepParams;
