use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use stint_ipc::Interval;
use thiserror::Error;

/// Largest id a stored interval may carry. Keeps the id counter far from
/// `u64::MAX` after hydration.
pub const MAX_INTERVAL_ID: u64 = i64::MAX as u64;

/// Whether `ms` maps to a calendar date chrono can represent.
pub fn is_representable(ms: i64) -> bool {
    DateTime::<Utc>::from_timestamp_millis(ms).is_some()
}

/// The full ledger state as written to storage on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub intervals: Vec<Interval>,
    pub is_running: bool,
    pub current_start_time: Option<i64>,
}

impl Snapshot {
    /// Checks the invariants a ledger relies on after hydration.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.is_running != self.current_start_time.is_some() {
            return Err(StoreError::Corrupt(format!(
                "isRunning is {} but currentStartTime is {:?}",
                self.is_running, self.current_start_time
            )));
        }
        if let Some(start) = self.current_start_time.filter(|&t| !is_representable(t)) {
            return Err(StoreError::Corrupt(format!(
                "currentStartTime {} is out of range",
                start
            )));
        }
        let mut seen = HashSet::with_capacity(self.intervals.len());
        for interval in &self.intervals {
            if interval.id > MAX_INTERVAL_ID {
                return Err(StoreError::Corrupt(format!(
                    "interval id {} is out of range",
                    interval.id
                )));
            }
            // Bounds are range-checked first so the duration check cannot overflow.
            if !is_representable(interval.start_time) || !is_representable(interval.end_time) {
                return Err(StoreError::Corrupt(format!(
                    "interval {} has out-of-range timestamps",
                    interval.id
                )));
            }
            if !interval.is_consistent() {
                return Err(StoreError::Corrupt(format!(
                    "interval {} has inconsistent bounds",
                    interval.id
                )));
            }
            if !seen.insert(interval.id) {
                return Err(StoreError::Corrupt(format!(
                    "duplicate interval id {}",
                    interval.id
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine data directory")]
    NoDataDir,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Key-value storage holding at most one snapshot.
pub trait SnapshotStore: Send {
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

pub fn data_dir() -> Result<PathBuf, StoreError> {
    let proj_dirs = ProjectDirs::from("com", "stint", "stint").ok_or(StoreError::NoDataDir)?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// Snapshot stored as pretty JSON on disk.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self, StoreError> {
        Ok(Self::new(data_dir()?.join("state.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Snapshot::from_json(&json).map(Some)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = snapshot.to_json()?;
        // Write-then-rename so a crash mid-write leaves the previous snapshot intact.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-memory store. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
