use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use ps_space::Trial;
use ps_store::{LookupStore, TrialStatus};
use ps_types::{validate_descriptor_path, JobDescriptor, SweepResult};

use crate::container::DataContainer;
use crate::dispatch::WorkerDispatcher;
use crate::materializer::TrialMaterializer;
use crate::params::SweepParams;

/// How far a sweep run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Materialize every trial, then run the worker on each incomplete one.
    #[default]
    Full,
    /// Stop after the artifacts are written and the lookup table is current.
    FilesOnly,
}

/// What a sweep run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub total: usize,
    /// Artifact pairs written by this run.
    pub materialized: usize,
    /// Trials whose artifacts were already on disk.
    pub skipped: usize,
    /// Worker invocations that finished successfully.
    pub dispatched: usize,
    /// Trials found complete before the run started.
    pub already_complete: usize,
}

/// Runs a parameter sweep end to end: enumerate, record, materialize, dispatch.
#[derive(Debug)]
pub struct SweepDriver {
    params: SweepParams,
    materializer: TrialMaterializer,
    dispatcher: Box<dyn WorkerDispatcher>,
}

impl SweepDriver {
    pub fn new(
        params: SweepParams,
        base: JobDescriptor,
        dispatcher: Box<dyn WorkerDispatcher>,
    ) -> SweepResult<Self> {
        params.space.checked_trial_count()?;
        Ok(Self {
            params,
            materializer: TrialMaterializer::new(base)?,
            dispatcher,
        })
    }

    /// Load a sweep descriptor and the worker job it refers to.
    pub fn from_sweep_file<P: AsRef<Path>>(
        path: P,
        dispatcher: Box<dyn WorkerDispatcher>,
    ) -> SweepResult<Self> {
        validate_descriptor_path(path.as_ref())?;
        let params = SweepParams::from_path(path.as_ref())?;
        let worker = params.worker_descriptor_path()?;
        let base = JobDescriptor::read(&worker)?;
        Self::new(params, base, dispatcher)
    }

    pub fn with_container(mut self, container: Box<dyn DataContainer>) -> Self {
        self.materializer = self.materializer.with_container(container);
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.materializer = self.materializer.with_work_dir(work_dir);
        self
    }

    pub fn params(&self) -> &SweepParams {
        &self.params
    }

    pub fn materializer(&self) -> &TrialMaterializer {
        &self.materializer
    }

    pub fn work_dir(&self) -> &Path {
        self.materializer.work_dir()
    }

    /// All trials of the sweep, in enumeration order.
    pub fn trials(&self) -> Vec<Trial> {
        self.params.space.enumerate().collect()
    }

    /// Bring every trial to `complete`, resuming from whatever the lookup
    /// table and working directory already hold.
    ///
    /// Stops at the first worker failure; that trial stays `processing` and is
    /// picked up again by the next run.
    pub async fn run(&self, mode: RunMode) -> SweepResult<SweepSummary> {
        let trials = self.trials();
        let title = self
            .materializer
            .base()
            .str_value("title")
            .unwrap_or(self.params.title.as_str());
        info!(
            "Running parameter sweep for {} trials of the {} driver.",
            trials.len(),
            title
        );
        debug!(
            conda_environment = %self.params.conda_environment,
            monitoring_directory = ?self.params.monitoring_directory,
            workspace = ?self.params.workspace_geoh5.as_ref().or(self.params.geoh5.as_ref()),
            "sweep settings"
        );

        let mut store = LookupStore::open(self.work_dir())?;
        let added = store.seed(&trials);
        store.persist()?;
        if added > 0 {
            info!("Recorded {} new trials in {}", added, store.path().display());
        }

        let mut summary = SweepSummary {
            total: trials.len(),
            ..SweepSummary::default()
        };

        for trial in &trials {
            let status = store.status(&trial.id).unwrap_or_default();
            if status.is_complete() {
                summary.already_complete += 1;
                continue;
            }

            if self.materializer.is_materialized(&trial.id) {
                info!(
                    "{}: Skipping trial: {}. Already computed and saved to file.",
                    trial.index, trial.id
                );
                summary.skipped += 1;
            } else {
                if status > TrialStatus::Pending {
                    warn!(trial = %trial.id, %status, "artifacts missing, rewriting");
                }
                self.materializer.materialize(trial)?;
                debug!(trial = %trial.id, index = trial.index, "materialized trial");
                summary.materialized += 1;
            }
            store.advance(&trial.id, TrialStatus::Written)?;
        }

        if mode == RunMode::FilesOnly {
            info!(
                "Wrote {} trial files to {}",
                summary.materialized,
                self.work_dir().display()
            );
            return Ok(summary);
        }

        for trial in &trials {
            if store.status(&trial.id).is_some_and(TrialStatus::is_complete) {
                continue;
            }

            store.advance(&trial.id, TrialStatus::Processing)?;
            let descriptor = self.materializer.descriptor_path(&trial.id);
            info!(
                "{}: Running trial {} with {}",
                trial.index,
                trial.id,
                self.dispatcher.name()
            );
            if let Err(e) = self.dispatcher.dispatch(&descriptor).await {
                error!("{}: Trial {} failed: {}", trial.index, trial.id, e);
                return Err(e);
            }
            store.advance(&trial.id, TrialStatus::Complete)?;
            summary.dispatched += 1;
        }

        let counts = store.counts();
        info!(
            "Parameter sweep finished: {} dispatched, {} already complete, {} of {} complete",
            summary.dispatched, summary.already_complete, counts.complete, summary.total
        );
        Ok(summary)
    }
}
