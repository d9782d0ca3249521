//! Roster Store
//!
//! The roster is an ordered list of records kept under a single key in a
//! byte store. Every mutation rewrites the whole list. Position is the only
//! identity an entry has, so a position observed before a delete may point
//! at a different record afterwards.
//!
//! Corrupt data is discarded and the next mutation replaces it. A store that
//! cannot be read at all is different: the roster opens empty but refuses to
//! mutate, so intact data behind a transient I/O error is never overwritten.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::record::StudentRecord;

pub const DEFAULT_ROSTER_KEY: &str = "savedCards";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Invalid store key: {0:?}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("No roster entry at position {position} (roster has {len})")]
    NotFound { position: usize, len: usize },

    #[error("Failed to persist roster: {0}")]
    Persistence(#[from] StoreError),

    #[error("Failed to serialize roster: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Roster {key:?} could not be read; refusing to overwrite it")]
    Unreadable { key: String },
}

/// Whole-value byte storage addressed by key.
pub trait ByteStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// In-process store; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryByteStore {
    values: HashMap<String, Vec<u8>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStore for MemoryByteStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory. Writes go through a
/// temporary file and rename, so readers never see a partial value.
#[derive(Debug, Clone)]
pub struct FileByteStore {
    dir: PathBuf,
}

impl FileByteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ByteStore for FileByteStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|err| StoreError::Write {
            path: self.dir.clone(),
            message: err.to_string(),
        })?;
        AtomicFile::new(&path, OverwriteBehavior::AllowOverwrite)
            .write(|f| {
                f.write_all(bytes)?;
                f.flush()
            })
            .map_err(|err| StoreError::Write { path, message: err.to_string() })
    }
}

/// A record and its current position in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub position: usize,
    pub record: StudentRecord,
}

pub struct RosterStore<S: ByteStore> {
    store: S,
    key: String,
    records: Vec<StudentRecord>,
    unreadable: bool,
}

impl<S: ByteStore> RosterStore<S> {
    /// Load the roster stored under `key`. Absent or corrupt data yields an
    /// empty roster. A read error also yields an empty roster, but one that
    /// rejects every mutation with [`RosterError::Unreadable`].
    pub fn open(store: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let mut unreadable = false;
        let records = match store.read(&key) {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<StudentRecord>>(&bytes) {
                Ok(records) => records,
                Err(err) => {
                    log::warn!("discarding corrupt roster under {key:?}: {err}");
                    vec![]
                }
            },
            Ok(None) => vec![],
            Err(err) => {
                log::error!("roster under {key:?} unreadable, opening read-only: {err}");
                unreadable = true;
                vec![]
            }
        };
        log::debug!("roster {key:?} opened with {} entries", records.len());

        Self { store, key, records, unreadable }
    }

    /// True when the stored roster could not be read and mutations are refused.
    pub fn is_unreadable(&self) -> bool {
        self.unreadable
    }

    pub fn append(&mut self, record: StudentRecord) -> Result<RosterEntry, RosterError> {
        self.check_writable()?;
        self.records.push(record.clone());
        if let Err(err) = self.flush() {
            self.records.pop();
            return Err(err);
        }

        let position = self.records.len() - 1;
        log::info!("saved card for {:?} at position {position}", record.name());
        Ok(RosterEntry { position, record })
    }

    /// Snapshot of every entry in order.
    pub fn list(&self) -> Vec<RosterEntry> {
        self.records
            .iter()
            .enumerate()
            .map(|(position, record)| RosterEntry { position, record: record.clone() })
            .collect()
    }

    /// Remove the entry at `position`; later entries shift down by one.
    pub fn delete_at(&mut self, position: usize) -> Result<StudentRecord, RosterError> {
        self.check_writable()?;
        self.check_bounds(position)?;
        let removed = self.records.remove(position);
        if let Err(err) = self.flush() {
            self.records.insert(position, removed);
            return Err(err);
        }

        log::info!("deleted card for {:?} at position {position}", removed.name());
        Ok(removed)
    }

    pub fn select_at(&self, position: usize) -> Result<StudentRecord, RosterError> {
        self.check_bounds(position)?;
        Ok(self.records[position].clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn check_bounds(&self, position: usize) -> Result<(), RosterError> {
        if position >= self.records.len() {
            return Err(RosterError::NotFound { position, len: self.records.len() });
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), RosterError> {
        if self.unreadable {
            return Err(RosterError::Unreadable { key: self.key.clone() });
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RosterError> {
        let bytes = serde_json::to_vec(&self.records)?;
        self.store.write(&self.key, &bytes)?;
        Ok(())
    }
}
