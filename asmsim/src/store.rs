//! Persistence of per-problem metadata records.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::StoreError;

pub trait MetadataStore {
    fn load(&self, id: &str) -> Result<Value, StoreError>;

    fn save(&mut self, id: &str, metadata: &Value) -> Result<(), StoreError>;
}

/// Keeps metadata records in memory, keyed by problem id.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, metadata: Value) {
        self.records.insert(id.into(), metadata);
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.records.get(id)
    }
}

impl MetadataStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Value, StoreError> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn save(&mut self, id: &str, metadata: &Value) -> Result<(), StoreError> {
        self.records.insert(id.to_string(), metadata.clone());
        Ok(())
    }
}

/// Stores each record as `<base>/<id>/<file name>`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    base: PathBuf,
    file_name: String,
}

impl JsonFileStore {
    pub fn new(base: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        JsonFileStore {
            base: base.into(),
            file_name: file_name.into(),
        }
    }

    pub fn path_of(&self, id: &str) -> PathBuf {
        self.base.join(id).join(&self.file_name)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl MetadataStore for JsonFileStore {
    fn load(&self, id: &str) -> Result<Value, StoreError> {
        let path = self.path_of(id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(id.to_string())),
            Err(e) => return Err(io_error(&path)(e)),
        };

        let value: Value = serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        if !value.is_object() {
            return Err(StoreError::NotAnObject(id.to_string()));
        }

        Ok(value)
    }

    /// Writes into a temporary file next to the target and moves it into place once fully flushed.
    /// On any failure the temporary file is removed and the target is left untouched.
    fn save(&mut self, id: &str, metadata: &Value) -> Result<(), StoreError> {
        let path = self.path_of(id);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_error(&path))?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, metadata).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
            writer.flush().map_err(io_error(&path))?;
        }

        tmp.persist(&path).map_err(|e| io_error(&path)(e.error))?;
        debug!("Saved metadata of {id} to {path:?}");

        Ok(())
    }
}
