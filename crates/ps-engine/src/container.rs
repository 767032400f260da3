use std::fs;
use std::io;
use std::path::Path;

use ps_types::{write_atomic_with, SweepResult};

/// Produces a per-trial copy of the base job's data container.
///
/// The container format belongs to the worker; the sweep only needs a
/// faithful, independent clone it can point the trial descriptor at.
pub trait DataContainer: Send + Sync + std::fmt::Debug {
    /// Clone `source` to `destination`. `destination` must not be observable
    /// in a partially written state.
    fn clone_to(&self, source: &Path, destination: &Path) -> SweepResult<()>;

    fn name(&self) -> &str;
}

/// Byte-for-byte file copy, staged through a temp file and renamed into place.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCopyContainer;

impl DataContainer for FileCopyContainer {
    fn clone_to(&self, source: &Path, destination: &Path) -> SweepResult<()> {
        let mut reader = fs::File::open(source)?;
        write_atomic_with(destination, |file| io::copy(&mut reader, file).map(|_| ()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file-copy"
    }
}
