//! Persisted mapping from trial id to parameter values and lifecycle status.
//!
//! The table lives at `<work_dir>/lookup.json`. It is only ever extended: every
//! persist re-reads the file and merges it with the in-memory table, so entries
//! written by earlier or interrupted runs are never dropped and a status is
//! never downgraded.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ps_space::{Trial, TrialId};
use ps_types::{write_atomic, StoreError, SweepResult};

/// File name of the lookup table inside the sweep working directory.
pub const LOOKUP_FILE: &str = "lookup.json";

/// Trial lifecycle. Variants are ordered; transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    #[default]
    Pending,
    Written,
    Processing,
    Complete,
}

impl TrialStatus {
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

impl std::fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Written => "written",
            Self::Processing => "processing",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// One row of the lookup table.
///
/// Parameter values are stored flat next to `status`, so tables written
/// without a status column read back as `pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub status: TrialStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LookupEntry {
    pub fn pending(parameters: Map<String, Value>) -> Self {
        Self {
            parameters,
            status: TrialStatus::Pending,
            updated_at: None,
        }
    }

    /// Move forward to `status`. Returns false, changing nothing, if the entry
    /// is already at or past it.
    pub fn advance(&mut self, status: TrialStatus) -> bool {
        if status <= self.status {
            return false;
        }
        self.status = status;
        self.updated_at = Some(Utc::now());
        true
    }

    /// Fold in another copy of the same entry, keeping the later status.
    pub fn merge(&mut self, other: &LookupEntry) {
        if other.status > self.status {
            self.status = other.status;
            self.updated_at = other.updated_at;
        }
        if self.parameters.is_empty() {
            self.parameters = other.parameters.clone();
        }
    }
}

/// Number of entries in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub written: usize,
    pub processing: usize,
    pub complete: usize,
}

/// The lookup table and its backing file.
#[derive(Debug)]
pub struct LookupStore {
    path: PathBuf,
    // Keyed by the id's string form so rows with foreign keys survive a rewrite.
    entries: BTreeMap<String, LookupEntry>,
}

impl LookupStore {
    /// Open the table in `work_dir`, loading any existing file.
    pub fn open<P: AsRef<Path>>(work_dir: P) -> SweepResult<Self> {
        Self::at_path(work_dir.as_ref().join(LOOKUP_FILE))
    }

    /// Open the table stored at an explicit file path.
    pub fn at_path<P: AsRef<Path>>(path: P) -> SweepResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = read_table(&path)?;
        if !entries.is_empty() {
            tracing::info!(
                "Resuming from {} with {} existing entries",
                path.display(),
                entries.len()
            );
        }
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &TrialId) -> Option<&LookupEntry> {
        self.entries.get(&id.to_string())
    }

    pub fn status(&self, id: &TrialId) -> Option<TrialStatus> {
        self.get(id).map(|e| e.status)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &LookupEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add every trial not already in the table as `pending`. Existing rows are
    /// left untouched. Returns the number of rows added. Call [`persist`] after.
    ///
    /// [`persist`]: LookupStore::persist
    pub fn seed<'a, I>(&mut self, trials: I) -> usize
    where
        I: IntoIterator<Item = &'a Trial>,
    {
        let mut added = 0;
        for trial in trials {
            self.entries.entry(trial.id.to_string()).or_insert_with(|| {
                added += 1;
                LookupEntry::pending(trial.to_json_map())
            });
        }
        added
    }

    /// Advance one trial and persist the table before returning.
    ///
    /// Returns whether the status changed. A no-op advance does not touch disk.
    pub fn advance(&mut self, id: &TrialId, status: TrialStatus) -> SweepResult<bool> {
        let entry = self
            .entries
            .get_mut(&id.to_string())
            .ok_or_else(|| StoreError::UnknownTrial {
                trial_id: id.to_string(),
            })?;

        if !entry.advance(status) {
            return Ok(false);
        }
        tracing::debug!(trial = %id, %status, "advanced trial");
        self.persist()?;
        Ok(true)
    }

    /// Merge with the current file contents and write the result atomically.
    pub fn persist(&mut self) -> SweepResult<()> {
        // Re-read every time: rows advanced by another run since load must
        // survive this write. One read per transition is small next to a
        // worker invocation.
        for (key, on_disk) in read_table(&self.path)? {
            self.entries
                .entry(key)
                .and_modify(|mine| mine.merge(&on_disk))
                .or_insert(on_disk);
        }

        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &bytes).map_err(|source| StoreError::Persist {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("Persisted {} lookup entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in self.entries.values() {
            match entry.status {
                TrialStatus::Pending => counts.pending += 1,
                TrialStatus::Written => counts.written += 1,
                TrialStatus::Processing => counts.processing += 1,
                TrialStatus::Complete => counts.complete += 1,
            }
        }
        counts
    }
}

fn read_table(path: &Path) -> SweepResult<BTreeMap<String, LookupEntry>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        StoreError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
        .into()
    })
}
