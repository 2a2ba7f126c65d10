//! Storage layer for tally
//!
//! Records live as JSON documents under the store directory:
//!
//! ```text
//! .tally/                       # Store directory (configurable)
//!   projects.json               # Projects with embedded stages and rollups
//!   tasks.json                  # Task records
//!   employees.json              # Employee records
//!   store.lock                  # Writer lock
//! ```
//!
//! Every document is a [`RecordFile`] envelope. Writers hold `store.lock` for
//! the whole read-modify-write and replace the document atomically.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Schema version stamped on every document
pub const SCHEMA_VERSION: &str = "tally.v1";

const PROJECTS_FILE: &str = "projects.json";
const TASKS_FILE: &str = "tasks.json";
const EMPLOYEES_FILE: &str = "employees.json";
const LOCK_FILE: &str = "store.lock";

/// Versioned envelope around a record list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFile<T> {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<T>,
}

impl<T> RecordFile<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            records,
        }
    }
}

/// Storage manager for tally state
#[derive(Debug, Clone)]
pub struct Storage {
    /// Workspace root (where `.tally.toml` lives)
    root: PathBuf,
    /// Directory holding the JSON documents
    store_dir: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    pub fn new(root: PathBuf, store_dir: PathBuf, lock_timeout_ms: u64) -> Self {
        Self {
            root,
            store_dir,
            lock_timeout_ms,
        }
    }

    /// Storage using the default `.tally/` directory under `root`
    pub fn for_root(root: PathBuf) -> Self {
        let store_dir = root.join(".tally");
        Self::new(root, store_dir, DEFAULT_LOCK_TIMEOUT_MS)
    }

    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self::new(
            root.to_path_buf(),
            config.store_dir(root),
            config.store.lock_timeout_ms,
        )
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn projects_file(&self) -> PathBuf {
        self.store_dir.join(PROJECTS_FILE)
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.store_dir.join(TASKS_FILE)
    }

    pub fn employees_file(&self) -> PathBuf {
        self.store_dir.join(EMPLOYEES_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.store_dir.join(LOCK_FILE)
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the store directory and empty documents that are missing
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.store_dir)?;
        lock::with_lock(self.lock_file(), self.lock_timeout_ms, || {
            for path in [self.projects_file(), self.tasks_file(), self.employees_file()] {
                if !path.exists() {
                    self.write_json(&path, &RecordFile::<serde_json::Value>::new(Vec::new()))?;
                }
            }
            Ok(())
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.projects_file().exists()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Read every record of a document; a missing document is empty
    pub fn read_records<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file: RecordFile<T> = self.read_json(path)?;
        Ok(file.records)
    }

    /// Read a document, skipping records that do not match `T`
    ///
    /// For bulk reads where one damaged record must not hide the rest.
    pub fn read_records_lenient<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file: RecordFile<serde_json::Value> = self.read_json(path)?;
        let mut records = Vec::with_capacity(file.records.len());
        for (index, value) in file.records.into_iter().enumerate() {
            match serde_json::from_value(value) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(path = %path.display(), index, error = %err, "skipping unreadable record");
                }
            }
        }
        Ok(records)
    }

    pub fn write_records<T: Serialize>(&self, path: &Path, records: Vec<T>) -> Result<()> {
        self.write_json(path, &RecordFile::new(records))
    }

    /// Read-modify-write a document while holding the store lock
    pub fn update_records<T, R, F>(&self, path: &Path, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> Result<R>,
    {
        lock::with_lock(self.lock_file(), self.lock_timeout_ms, || {
            let mut records: Vec<T> = self.read_records(path)?;
            let result = f(&mut records)?;
            self.write_records(path, records)?;
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Record {
        id: u32,
        label: String,
    }

    #[test]
    fn storage_paths() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let storage = Storage::for_root(root.clone());

        assert_eq!(storage.store_dir(), root.join(".tally"));
        assert_eq!(storage.projects_file(), root.join(".tally/projects.json"));
        assert_eq!(storage.tasks_file(), root.join(".tally/tasks.json"));
        assert_eq!(storage.employees_file(), root.join(".tally/employees.json"));
        assert_eq!(storage.lock_file(), root.join(".tally/store.lock"));
    }

    #[test]
    fn init_creates_empty_documents() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::for_root(temp.path().to_path_buf());
        assert!(!storage.is_initialized());

        storage.init().unwrap();

        assert!(storage.is_initialized());
        let projects: Vec<Record> = storage.read_records(&storage.projects_file()).unwrap();
        assert!(projects.is_empty());
        let raw = fs::read_to_string(storage.tasks_file()).unwrap();
        assert!(raw.contains(SCHEMA_VERSION));
    }

    #[test]
    fn missing_document_reads_empty() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::for_root(temp.path().to_path_buf());
        let records: Vec<Record> = storage.read_records(&storage.tasks_file()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn update_records_round_trips() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::for_root(temp.path().to_path_buf());
        let path = storage.tasks_file();

        let count = storage
            .update_records(&path, |records: &mut Vec<Record>| {
                records.push(Record {
                    id: 1,
                    label: "first".to_string(),
                });
                records.push(Record {
                    id: 2,
                    label: "second".to_string(),
                });
                Ok(records.len())
            })
            .unwrap();
        assert_eq!(count, 2);

        let records: Vec<Record> = storage.read_records(&path).unwrap();
        assert_eq!(records[1].label, "second");
    }

    #[test]
    fn lenient_read_skips_damaged_records() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::for_root(temp.path().to_path_buf());
        let path = storage.tasks_file();
        let file = RecordFile::new(vec![
            serde_json::json!({"id": 1, "label": "ok"}),
            serde_json::json!({"id": "not a number"}),
        ]);
        storage.write_json(&path, &file).unwrap();

        let records: Vec<Record> = storage.read_records_lenient(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert!(storage.read_records::<Record>(&path).is_err());
    }
}
