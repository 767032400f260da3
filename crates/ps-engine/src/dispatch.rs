//! Worker invocation. A worker consumes exactly one thing: the path of a
//! trial descriptor.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use ps_types::{ConfigError, JobDescriptor, SweepResult, WorkerError};

/// Environment variable overriding the interpreter of [`WorkerCommand::PythonModule`].
pub const PYTHON_ENV: &str = "PARAM_SWEEPS_PYTHON";

/// Runs the worker for one trial and waits for it to finish.
#[async_trait]
pub trait WorkerDispatcher: Send + Sync + fmt::Debug {
    /// Any error is final for the current sweep run; nothing is retried.
    async fn dispatch(&self, descriptor: &Path) -> SweepResult<()>;

    fn name(&self) -> &str;
}

/// How the subprocess worker is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCommand {
    /// `<interpreter> -m <module> <descriptor>`, where `module` is the trial
    /// descriptor's `run_command`, or `fallback_module` when it has none.
    PythonModule {
        interpreter: String,
        fallback_module: String,
    },
    /// `<program> <args...> <descriptor>`
    Program { program: String, args: Vec<String> },
}

/// Launches the worker as a child process.
#[derive(Debug, Clone)]
pub struct SubprocessDispatcher {
    command: WorkerCommand,
}

impl SubprocessDispatcher {
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }

    /// Python module worker, interpreter taken from `PARAM_SWEEPS_PYTHON`
    /// (default `python`).
    pub fn python_module(fallback_module: impl Into<String>) -> Self {
        let interpreter = std::env::var(PYTHON_ENV).unwrap_or_else(|_| "python".to_string());
        Self::new(WorkerCommand::PythonModule {
            interpreter,
            fallback_module: fallback_module.into(),
        })
    }

    pub fn program(program: impl Into<String>, args: Vec<String>) -> Self {
        Self::new(WorkerCommand::Program {
            program: program.into(),
            args,
        })
    }

    /// Program and arguments for one trial, descriptor path last.
    fn command_line(&self, descriptor: &Path) -> SweepResult<(String, Vec<String>)> {
        let path = descriptor.to_string_lossy().into_owned();
        match &self.command {
            WorkerCommand::PythonModule {
                interpreter,
                fallback_module,
            } => {
                let job = JobDescriptor::read(descriptor)?;
                let module = job
                    .str_value("run_command")
                    .unwrap_or(fallback_module)
                    .to_string();
                Ok((interpreter.clone(), vec!["-m".to_string(), module, path]))
            }
            WorkerCommand::Program { program, args } => {
                let mut argv = args.clone();
                argv.push(path);
                Ok((program.clone(), argv))
            }
        }
    }
}

#[async_trait]
impl WorkerDispatcher for SubprocessDispatcher {
    async fn dispatch(&self, descriptor: &Path) -> SweepResult<()> {
        let (program, args) = self.command_line(descriptor)?;
        debug!("Spawning worker: {} {}", program, args.join(" "));

        let status = Command::new(&program)
            .args(&args)
            .status()
            .await
            .map_err(|source| WorkerError::Spawn {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(WorkerError::NonZeroExit {
                code: status.code(),
                descriptor: descriptor.to_path_buf(),
            }
            .into())
        }
    }

    fn name(&self) -> &str {
        match &self.command {
            WorkerCommand::PythonModule { .. } => "python-module",
            WorkerCommand::Program { program, .. } => program,
        }
    }
}

/// An in-process worker.
pub type WorkerFn = Arc<dyn Fn(&Path) -> SweepResult<()> + Send + Sync>;

/// In-process workers addressable by name.
#[derive(Default, Clone)]
pub struct WorkerRegistry {
    workers: HashMap<String, WorkerFn>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: impl Into<String>, worker: F) -> Self
    where
        F: Fn(&Path) -> SweepResult<()> + Send + Sync + 'static,
    {
        self.workers.insert(name.into(), Arc::new(worker));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.workers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a worker by name.
    pub fn resolve(&self, name: &str) -> SweepResult<RegistryDispatcher> {
        let worker = self
            .workers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownWorker {
                name: name.to_string(),
            })?;
        Ok(RegistryDispatcher {
            name: name.to_string(),
            worker,
        })
    }
}

impl fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("workers", &self.names())
            .finish()
    }
}

/// Dispatches to a worker resolved from a [`WorkerRegistry`].
#[derive(Clone)]
pub struct RegistryDispatcher {
    name: String,
    worker: WorkerFn,
}

impl fmt::Debug for RegistryDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryDispatcher")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl WorkerDispatcher for RegistryDispatcher {
    async fn dispatch(&self, descriptor: &Path) -> SweepResult<()> {
        (self.worker)(descriptor)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
