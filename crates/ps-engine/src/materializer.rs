//! Per-trial input artifacts: a cloned data container and a descriptor
//! pointing at it, both named after the trial id.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use ps_space::{Trial, TrialId};
use ps_types::{
    config_error, ConfigError, JobDescriptor, SweepResult, CONTAINER_EXTENSION, CONTAINER_FIELD,
    DESCRIPTOR_EXTENSION,
};

use crate::container::{DataContainer, FileCopyContainer};

/// Outcome of materializing one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Written,
    /// Both artifacts were already on disk.
    Skipped,
}

#[derive(Debug)]
pub struct TrialMaterializer {
    base: JobDescriptor,
    container_source: PathBuf,
    work_dir: PathBuf,
    container: Box<dyn DataContainer>,
}

impl TrialMaterializer {
    /// Prepare to materialize trials of `base`.
    ///
    /// The working directory defaults to the directory holding the base job's
    /// data container.
    pub fn new(base: JobDescriptor) -> SweepResult<Self> {
        let base_dir = base
            .path()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let field = base.str_value(CONTAINER_FIELD).ok_or_else(|| ConfigError::MissingContainer {
            path: base.path().map(Path::to_path_buf).unwrap_or_default(),
            field: CONTAINER_FIELD.to_string(),
        })?;
        let container_source = base_dir.join(field);
        if !container_source.is_file() {
            return Err(config_error!(
                "Data container {} does not exist",
                container_source.display()
            ));
        }

        let work_dir = container_source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(base_dir);

        Ok(Self {
            base,
            container_source,
            work_dir,
            container: Box::new(FileCopyContainer),
        })
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_container(mut self, container: Box<dyn DataContainer>) -> Self {
        self.container = container;
        self
    }

    pub fn base(&self) -> &JobDescriptor {
        &self.base
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn artifact_path(&self, id: &TrialId) -> PathBuf {
        self.work_dir.join(format!("{id}.{CONTAINER_EXTENSION}"))
    }

    pub fn descriptor_path(&self, id: &TrialId) -> PathBuf {
        self.work_dir.join(format!("{id}.{DESCRIPTOR_EXTENSION}"))
    }

    /// True when both the data artifact and its descriptor exist.
    pub fn is_materialized(&self, id: &TrialId) -> bool {
        self.artifact_path(id).is_file() && self.descriptor_path(id).is_file()
    }

    /// The base descriptor with the trial's values overlaid and the data
    /// container field pointing at the trial's artifact.
    pub fn trial_descriptor(&self, trial: &Trial) -> JobDescriptor {
        let mut descriptor = self.base.clone();
        for (name, value) in &trial.parameters {
            if !descriptor.contains(name) {
                warn!(trial = %trial.id, parameter = %name, "swept parameter not present in worker job");
            }
            descriptor.set_value(name, value.to_json());
        }
        let artifact = self.artifact_path(&trial.id);
        descriptor.set_value(
            CONTAINER_FIELD,
            Value::from(artifact.to_string_lossy().into_owned()),
        );
        descriptor
    }

    /// Write the trial's data artifact, then its descriptor.
    ///
    /// Skips when both already exist. Otherwise overwrites whatever partial
    /// state is on disk.
    pub fn materialize(&self, trial: &Trial) -> SweepResult<Materialized> {
        if self.is_materialized(&trial.id) {
            return Ok(Materialized::Skipped);
        }

        let artifact = self.artifact_path(&trial.id);
        self.container.clone_to(&self.container_source, &artifact)?;
        debug!(trial = %trial.id, container = self.container.name(), "cloned data container");

        self.trial_descriptor(trial).write(self.descriptor_path(&trial.id))?;
        Ok(Materialized::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_space::ParameterSpace;
    use serde_json::json;
    use std::fs;

    fn setup(dir: &Path) -> TrialMaterializer {
        fs::write(dir.join("worker.ui.geoh5"), b"container").unwrap();
        let worker = dir.join("worker.ui.json");
        fs::write(
            &worker,
            json!({
                "title": "Sample worker",
                "run_command": "param_sweeps.sample_worker",
                "geoh5": "worker.ui.geoh5",
                "param": {"label": "Add value", "value": 1},
            })
            .to_string(),
        )
        .unwrap();
        TrialMaterializer::new(JobDescriptor::read(&worker).unwrap()).unwrap()
    }

    fn trials() -> Vec<Trial> {
        ParameterSpace::new()
            .add_range("param", 1i64, 2i64, 2)
            .enumerate()
            .collect()
    }

    #[test]
    fn work_dir_is_container_dir() {
        let dir = tempfile::tempdir().unwrap();
        let m = setup(dir.path());
        assert_eq!(m.work_dir(), dir.path());
    }

    #[test]
    fn writes_artifact_pair_named_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let m = setup(dir.path());
        let trials = trials();
        let trial = &trials[1];

        assert_eq!(m.materialize(trial).unwrap(), Materialized::Written);

        let id = trial.id.to_string();
        assert_eq!(fs::read(dir.path().join(format!("{id}.ui.geoh5"))).unwrap(), b"container");
        let written = JobDescriptor::read(dir.path().join(format!("{id}.ui.json"))).unwrap();
        assert_eq!(written.value("param"), Some(&json!(2)));
        assert_eq!(written.fields()["param"]["label"], json!("Add value"));
        let artifact = m.artifact_path(&trial.id).to_string_lossy().into_owned();
        assert_eq!(written.str_value("geoh5"), Some(artifact.as_str()));
    }

    #[test]
    fn second_materialize_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let m = setup(dir.path());
        let trials = trials();
        let trial = &trials[0];

        assert_eq!(m.materialize(trial).unwrap(), Materialized::Written);
        assert_eq!(m.materialize(trial).unwrap(), Materialized::Skipped);
    }

    #[test]
    fn missing_descriptor_triggers_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let m = setup(dir.path());
        let trials = trials();
        let trial = &trials[0];
        m.materialize(trial).unwrap();

        fs::remove_file(m.descriptor_path(&trial.id)).unwrap();
        assert!(!m.is_materialized(&trial.id));
        assert_eq!(m.materialize(trial).unwrap(), Materialized::Written);
        assert!(m.is_materialized(&trial.id));
    }

    #[test]
    fn base_trial_keeps_worker_values() {
        let dir = tempfile::tempdir().unwrap();
        let m = setup(dir.path());
        let base = ParameterSpace::new().enumerate().next().unwrap();

        let d = m.trial_descriptor(&base);
        assert_eq!(d.value("param"), Some(&json!(1)));
        assert_eq!(d.str_value("title"), Some("Sample worker"));
    }

    #[test]
    fn missing_container_field_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let worker = dir.path().join("worker.ui.json");
        fs::write(&worker, json!({"param": 1}).to_string()).unwrap();

        let err = TrialMaterializer::new(JobDescriptor::read(&worker).unwrap()).unwrap_err();
        assert!(err.to_string().contains("geoh5"));
    }

    #[test]
    fn missing_container_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let worker = dir.path().join("worker.ui.json");
        fs::write(&worker, json!({"geoh5": "gone.ui.geoh5"}).to_string()).unwrap();

        let err = TrialMaterializer::new(JobDescriptor::read(&worker).unwrap()).unwrap_err();
        assert!(err.to_string().contains("gone.ui.geoh5"));
    }
}
