//! Sweep configuration parsed from a `*_sweep.ui.json` descriptor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ps_space::ParameterSpace;
use ps_types::{ConfigError, JobDescriptor, SweepResult, DESCRIPTOR_EXTENSION};

const SWEEP_SUFFIX: &str = "_sweep";

/// Typed sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub title: String,

    /// Python module run by the default subprocess worker when the trial
    /// descriptor names none.
    pub run_command: String,

    pub conda_environment: String,
    pub monitoring_directory: Option<String>,
    pub workspace_geoh5: Option<String>,
    pub geoh5: Option<String>,

    /// Worker job descriptor. Derived from the sweep file name when absent.
    pub worker_uijson: Option<PathBuf>,

    /// Swept axes, parsed once from the `_start`/`_end`/`_n` triples.
    #[serde(skip)]
    pub space: ParameterSpace,

    /// Sweep descriptor these params were read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            title: "Parameter sweep".to_string(),
            run_command: "param_sweeps.driver".to_string(),
            conda_environment: "param_sweeps".to_string(),
            monitoring_directory: None,
            workspace_geoh5: None,
            geoh5: None,
            worker_uijson: None,
            space: ParameterSpace::new(),
            source: None,
        }
    }
}

impl SweepParams {
    /// Read a sweep descriptor from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> SweepResult<Self> {
        let descriptor = JobDescriptor::read(path.as_ref())?;
        let mut params = Self::from_descriptor(&descriptor)?;
        params.source = Some(path.as_ref().to_path_buf());
        Ok(params)
    }

    /// Split a sweep descriptor into known settings and the parameter space.
    pub fn from_descriptor(descriptor: &JobDescriptor) -> SweepResult<Self> {
        let defaults = Self::default();
        let text = |name: &str| descriptor.str_value(name).map(str::to_string);

        Ok(Self {
            title: text("title").unwrap_or(defaults.title),
            run_command: text("run_command").unwrap_or(defaults.run_command),
            conda_environment: text("conda_environment").unwrap_or(defaults.conda_environment),
            monitoring_directory: text("monitoring_directory"),
            workspace_geoh5: text("workspace_geoh5"),
            geoh5: text("geoh5"),
            worker_uijson: text("worker_uijson").map(PathBuf::from),
            space: ParameterSpace::from_descriptor(descriptor)?,
            source: descriptor.path().map(Path::to_path_buf),
        })
    }

    pub fn with_worker(mut self, path: impl Into<PathBuf>) -> Self {
        self.worker_uijson = Some(path.into());
        self
    }

    pub fn with_space(mut self, space: ParameterSpace) -> Self {
        self.space = space;
        self
    }

    /// Path of the worker job descriptor.
    ///
    /// An explicit `worker_uijson` wins, resolved against the sweep file's
    /// directory when relative. Otherwise `name_sweep.ui.json` maps to
    /// `name.ui.json` next to it.
    pub fn worker_descriptor_path(&self) -> SweepResult<PathBuf> {
        let sweep_dir = self
            .source
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));

        if let Some(worker) = &self.worker_uijson {
            return Ok(if worker.is_relative() {
                sweep_dir.join(worker)
            } else {
                worker.clone()
            });
        }

        let source = self.source.as_deref().ok_or_else(|| ConfigError::UnresolvedWorker {
            path: PathBuf::new(),
        })?;
        let unresolved = || ConfigError::UnresolvedWorker {
            path: source.to_path_buf(),
        };
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(unresolved)?;
        let stem = name
            .strip_suffix(DESCRIPTOR_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .and_then(|s| s.strip_suffix(SWEEP_SUFFIX))
            .ok_or_else(unresolved)?;

        Ok(sweep_dir.join(format!("{stem}.{DESCRIPTOR_EXTENSION}")))
    }
}
