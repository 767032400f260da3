use std::path::PathBuf;
use thiserror::Error;

/// Main error type for a parameter sweep
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lookup store error: {0}")]
    Store(#[from] StoreError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Malformed sweep definitions and descriptors. Raised before any trial is enumerated.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parameter '{parameter}' has '{parameter}_end' but no '{parameter}_n'")]
    MissingSampleCount { parameter: String },

    #[error("Parameter '{parameter}' sample count must be a positive integer, got {value}")]
    InvalidSampleCount { parameter: String, value: String },

    #[error("Field '{field}' must be numeric, got {value}")]
    NonNumeric { field: String, value: String },

    #[error("Parameter space exceeds the limit of {limit} trials")]
    TooManyTrials { limit: usize },

    #[error("Parameter name '{parameter}' is reserved")]
    ReservedName { parameter: String },

    #[error("File argument {} must have extension 'ui.json'.", path.display())]
    BadExtension { path: PathBuf },

    #[error("File argument {} is not a valid ui.json file: {reason}", path.display())]
    InvalidDescriptor { path: PathBuf, reason: String },

    #[error("Job descriptor {} has no data container field '{field}'", path.display())]
    MissingContainer { path: PathBuf, field: String },

    #[error("Cannot resolve worker descriptor for sweep file {}", path.display())]
    UnresolvedWorker { path: PathBuf },

    #[error("No worker registered under the name '{name}'")]
    UnknownWorker { name: String },

    #[error("{0}")]
    Other(String),
}

/// Failures reading or persisting the lookup table
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Lookup table {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to persist lookup table {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown trial id: {trial_id}")]
    UnknownTrial { trial_id: String },
}

/// Non-success results from a dispatched worker
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker exited with {}: {}", code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")), descriptor.display())]
    NonZeroExit {
        code: Option<i32>,
        descriptor: PathBuf,
    },

    #[error("Worker '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

/// Result type alias for sweep operations
pub type SweepResult<T> = Result<T, SweepError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::SweepError::Config($crate::ConfigError::Other(format!($($arg)*)))
    };
}
