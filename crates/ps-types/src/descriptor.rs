//! Job descriptor documents (`*.ui.json`).
//!
//! A descriptor is a JSON object. Each field is either a raw value or a form
//! object carrying its value under `"value"`; forms with `"enabled": false`
//! read as absent.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::errors::{ConfigError, SweepResult};

/// Required suffix of every job descriptor file name.
pub const DESCRIPTOR_EXTENSION: &str = "ui.json";

/// Suffix of materialized data container files.
pub const CONTAINER_EXTENSION: &str = "ui.geoh5";

/// Descriptor field holding the path of the job's data container.
pub const CONTAINER_FIELD: &str = "geoh5";

/// A worker or sweep job descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobDescriptor {
    fields: Map<String, Value>,
    path: Option<PathBuf>,
}

impl JobDescriptor {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields, path: None }
    }

    /// Read and validate a descriptor from disk.
    pub fn read<P: AsRef<Path>>(path: P) -> SweepResult<Self> {
        let path = path.as_ref();
        check_extension(path)?;

        let text = fs::read_to_string(path).map_err(|e| ConfigError::InvalidDescriptor {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let fields = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => {
                return Err(ConfigError::InvalidDescriptor {
                    path: path.to_path_buf(),
                    reason: "top level is not an object".to_string(),
                }
                .into())
            }
            Err(e) => {
                return Err(ConfigError::InvalidDescriptor {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
                .into())
            }
        };

        Ok(Self {
            fields,
            path: Some(path.to_path_buf()),
        })
    }

    /// File this descriptor was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Field names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Effective value of a field. Disabled forms and nulls read as `None`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        let raw = self.fields.get(name)?;
        let value = match raw {
            Value::Object(form) if form.contains_key("value") => {
                if form.get("enabled") == Some(&Value::Bool(false)) {
                    return None;
                }
                form.get("value")?
            }
            other => other,
        };
        (!value.is_null()).then_some(value)
    }

    pub fn str_value(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// Overwrite the value of a field, keeping any surrounding form metadata.
    pub fn set_value(&mut self, name: &str, value: Value) {
        match self.fields.get_mut(name) {
            Some(Value::Object(form)) if form.contains_key("value") => {
                form.insert("value".to_string(), value);
                if form.contains_key("enabled") {
                    form.insert("enabled".to_string(), Value::Bool(true));
                }
            }
            _ => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }

    /// Write the descriptor as indented JSON, replacing `path` atomically.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> SweepResult<()> {
        let bytes = serde_json::to_vec_pretty(&self.fields)?;
        write_atomic(path.as_ref(), &bytes)?;
        Ok(())
    }
}

/// Check that `path` names a readable `ui.json` descriptor holding a JSON object.
pub fn validate_descriptor_path<P: AsRef<Path>>(path: P) -> SweepResult<()> {
    JobDescriptor::read(path).map(|_| ())
}

fn check_extension(path: &Path) -> SweepResult<()> {
    if path.to_string_lossy().ends_with(DESCRIPTOR_EXTENSION) {
        Ok(())
    } else {
        Err(ConfigError::BadExtension {
            path: path.to_path_buf(),
        }
        .into())
    }
}

/// Write `bytes` to `path` atomically. See [`write_atomic_with`].
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    write_atomic_with(path, |file| file.write_all(bytes))
}

/// Fill a temp file next to `path`, sync it, then rename it over `path`.
///
/// Readers see either the previous file or the complete new one. The temp
/// file is removed if `fill` fails.
pub fn write_atomic_with<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    fill(staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}
