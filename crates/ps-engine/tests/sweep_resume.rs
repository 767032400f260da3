use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use ps_engine::{RunMode, SweepDriver, WorkerRegistry};
use ps_store::{LookupStore, TrialStatus, LOOKUP_FILE};
use ps_types::{JobDescriptor, SweepError, WorkerError};

/// Worker and sweep descriptors plus the worker's data container.
fn write_job(dir: &Path, sweep: Value) -> PathBuf {
    fs::write(dir.join("worker.ui.geoh5"), b"container bytes").unwrap();
    fs::write(
        dir.join("worker.ui.json"),
        json!({
            "title": "Sample worker",
            "run_command": "param_sweeps.sample_worker",
            "geoh5": "worker.ui.geoh5",
            "param": {"label": "Add value", "value": 1},
            "factor": {"label": "Scale", "value": 0.5},
        })
        .to_string(),
    )
    .unwrap();

    let path = dir.join("worker_sweep.ui.json");
    fs::write(&path, sweep.to_string()).unwrap();
    path
}

fn two_trial_sweep() -> Value {
    json!({
        "title": "Parameter sweep",
        "param_start": {"label": "param start", "value": 1},
        "param_end": {"label": "param end", "value": 2},
        "param_n": {"label": "param n samples", "value": 2},
    })
}

/// Records every descriptor it is handed. Fails while `fail` is set.
#[derive(Clone, Default)]
struct RecordingWorker {
    seen: Arc<Mutex<Vec<PathBuf>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingWorker {
    fn driver(&self, sweep: &Path) -> SweepDriver {
        let seen = self.seen.clone();
        let fail = self.fail.clone();
        let dispatcher = WorkerRegistry::new()
            .register("recording", move |descriptor: &Path| {
                if fail.load(Ordering::SeqCst) {
                    return Err(WorkerError::Failed {
                        name: "recording".to_string(),
                        message: "worker crashed".to_string(),
                    }
                    .into());
                }
                seen.lock().unwrap().push(descriptor.to_path_buf());
                Ok(())
            })
            .resolve("recording")
            .unwrap();
        SweepDriver::from_sweep_file(sweep, Box::new(dispatcher)).unwrap()
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

fn lookup(dir: &Path) -> LookupStore {
    LookupStore::open(dir).unwrap()
}

#[tokio::test]
async fn two_trials_complete_with_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = write_job(dir.path(), two_trial_sweep());
    let worker = RecordingWorker::default();
    let driver = worker.driver(&sweep);

    let summary = driver.run(RunMode::Full).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.materialized, 2);
    assert_eq!(summary.dispatched, 2);

    let store = lookup(dir.path());
    assert_eq!(store.len(), 2);
    assert_eq!(store.counts().complete, 2);

    for (trial, expected) in driver.trials().iter().zip([1, 2]) {
        let entry = store.get(&trial.id).unwrap();
        assert_eq!(entry.parameters["param"], json!(expected));
        assert!(entry.updated_at.is_some());

        let id = trial.id.to_string();
        assert!(dir.path().join(format!("{id}.ui.geoh5")).is_file());
        let descriptor = JobDescriptor::read(dir.path().join(format!("{id}.ui.json"))).unwrap();
        assert_eq!(descriptor.value("param"), Some(&json!(expected)));
        assert_eq!(descriptor.value("factor"), Some(&json!(0.5)));
    }

    // Dispatched in enumeration order.
    let seen = worker.seen.lock().unwrap().clone();
    let expected: Vec<PathBuf> = driver
        .trials()
        .iter()
        .map(|t| driver.materializer().descriptor_path(&t.id))
        .collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn sweep_without_axes_runs_base_job_once() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = write_job(dir.path(), json!({"title": "Parameter sweep"}));
    let worker = RecordingWorker::default();
    let driver = worker.driver(&sweep);

    let summary = driver.run(RunMode::Full).await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(worker.calls(), 1);

    let seen = worker.seen.lock().unwrap()[0].clone();
    let descriptor = JobDescriptor::read(&seen).unwrap();
    assert_eq!(descriptor.value("param"), Some(&json!(1)));
    assert_eq!(descriptor.str_value("title"), Some("Sample worker"));
    assert_eq!(lookup(dir.path()).counts().complete, 1);
}

#[tokio::test]
async fn rerun_after_completion_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = write_job(dir.path(), two_trial_sweep());
    let worker = RecordingWorker::default();

    worker.driver(&sweep).run(RunMode::Full).await.unwrap();
    let before = fs::read(dir.path().join(LOOKUP_FILE)).unwrap();

    let summary = worker.driver(&sweep).run(RunMode::Full).await.unwrap();
    assert_eq!(summary.dispatched, 0);
    assert_eq!(summary.materialized, 0);
    assert_eq!(summary.already_complete, 2);
    assert_eq!(worker.calls(), 2);

    let after = fs::read(dir.path().join(LOOKUP_FILE)).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn files_only_then_full_reuses_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = write_job(dir.path(), two_trial_sweep());
    let worker = RecordingWorker::default();

    let first = worker.driver(&sweep).run(RunMode::FilesOnly).await.unwrap();
    assert_eq!(first.materialized, 2);
    assert_eq!(worker.calls(), 0);
    assert_eq!(lookup(dir.path()).counts().written, 2);

    let second = worker.driver(&sweep).run(RunMode::Full).await.unwrap();
    assert_eq!(second.materialized, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.dispatched, 2);
    assert_eq!(lookup(dir.path()).counts().complete, 2);
}

#[tokio::test]
async fn failed_trial_stays_processing_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = write_job(
        dir.path(),
        json!({"param_start": 1, "param_end": 3, "param_n": 3}),
    );
    let worker = RecordingWorker::default();
    worker.fail.store(true, Ordering::SeqCst);

    let driver = worker.driver(&sweep);
    let err = driver.run(RunMode::Full).await.unwrap_err();
    assert!(matches!(err, SweepError::Worker(WorkerError::Failed { .. })));

    let trials = driver.trials();
    let store = lookup(dir.path());
    assert_eq!(store.status(&trials[0].id), Some(TrialStatus::Processing));
    assert_eq!(store.status(&trials[1].id), Some(TrialStatus::Written));
    assert_eq!(store.status(&trials[2].id), Some(TrialStatus::Written));

    worker.fail.store(false, Ordering::SeqCst);
    let summary = worker.driver(&sweep).run(RunMode::Full).await.unwrap();
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.dispatched, 3);
    assert_eq!(lookup(dir.path()).counts().complete, 3);
}

#[tokio::test]
async fn prior_lookup_entries_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = write_job(dir.path(), two_trial_sweep());
    let worker = RecordingWorker::default();
    let trials = worker.driver(&sweep).trials();

    // First trial finished by an earlier run, plus a row this sweep does not produce.
    fs::write(
        dir.path().join(LOOKUP_FILE),
        json!({
            trials[0].id.to_string(): {"param": 1, "status": "complete"},
            "legacy-row": {"param": 99},
        })
        .to_string(),
    )
    .unwrap();

    let summary = worker.driver(&sweep).run(RunMode::Full).await.unwrap();
    assert_eq!(summary.already_complete, 1);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(
        *worker.seen.lock().unwrap(),
        vec![dir.path().join(format!("{}.ui.json", trials[1].id))]
    );

    let store = lookup(dir.path());
    assert_eq!(store.len(), 3);
    let legacy = store.entries().find(|(k, _)| *k == "legacy-row").unwrap().1;
    assert_eq!(legacy.status, TrialStatus::Pending);
    assert_eq!(store.counts().complete, 2);
}

#[tokio::test]
async fn missing_artifact_is_rewritten_without_status_regression() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = write_job(dir.path(), two_trial_sweep());
    let worker = RecordingWorker::default();

    let driver = worker.driver(&sweep);
    driver.run(RunMode::FilesOnly).await.unwrap();
    let trials = driver.trials();
    fs::remove_file(driver.materializer().artifact_path(&trials[1].id)).unwrap();

    let summary = worker.driver(&sweep).run(RunMode::FilesOnly).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.materialized, 1);
    assert!(driver.materializer().is_materialized(&trials[1].id));
    assert_eq!(lookup(dir.path()).counts().written, 2);
}

#[test]
fn wrong_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker_sweep.json");
    fs::write(&path, "{}").unwrap();

    let dispatcher = WorkerRegistry::new()
        .register("noop", |_| Ok(()))
        .resolve("noop")
        .unwrap();
    let err = SweepDriver::from_sweep_file(&path, Box::new(dispatcher)).unwrap_err();
    assert!(err.to_string().contains("must have extension 'ui.json'"));
}
