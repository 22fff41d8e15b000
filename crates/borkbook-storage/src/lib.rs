use borkbook_core::{CoreError, MealsSnapshot};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_SUBJECTS: [&str; 2] = ["Precious", "Tucker"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result of a write-through after an in-memory mutation. A failed write
/// leaves the in-memory state as the source of truth.
#[derive(Debug)]
pub enum PersistOutcome {
    Persisted,
    Failed(StorageError),
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistOutcome::Persisted)
    }
}

impl From<Result<(), StorageError>> for PersistOutcome {
    fn from(result: Result<(), StorageError>) -> Self {
        match result {
            Ok(()) => PersistOutcome::Persisted,
            Err(err) => PersistOutcome::Failed(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Loaded,
    Synthesized,
}

/// The pretty-printed JSON file backing the meal state.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Any well-formed JSON document is adopted. Only an unreadable file or a
    /// syntax error is an error.
    pub fn load(&self) -> Result<MealsSnapshot, StorageError> {
        let content =
            fs::read_to_string(&self.path).map_err(|source| io_error(&self.path, source))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        if !value.is_object() {
            warn!(
                event = "meals_unexpected_shape",
                path = %self.path.display(),
                reason = "top level is not an object"
            );
        }
        Ok(MealsSnapshot::from_value(value))
    }

    pub fn save(&self, snapshot: &MealsSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string_pretty(snapshot)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        write_atomic(&self.path, &payload)
    }
}

fn write_atomic(path: &Path, payload: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
    }

    let temp_path = match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.tmp", name.to_string_lossy())),
        None => path.with_extension("tmp"),
    };

    fs::write(&temp_path, payload).map_err(|source| io_error(&temp_path, source))?;
    fs::rename(&temp_path, path).map_err(|source| io_error(path, source))?;
    Ok(())
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Snapshot captured right after a mutation, written out once the caller has
/// released whatever lock guards the store.
#[derive(Debug, Clone)]
#[must_use = "a pending write does nothing until `write` is called"]
pub struct PendingWrite {
    file: SnapshotFile,
    snapshot: MealsSnapshot,
}

impl PendingWrite {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn write(self) -> PersistOutcome {
        let outcome = PersistOutcome::from(self.file.save(&self.snapshot));
        match &outcome {
            PersistOutcome::Persisted => {
                info!(event = "meals_persisted", path = %self.file.path().display());
            }
            PersistOutcome::Failed(err) => {
                warn!(
                    event = "meals_persist_failed",
                    path = %self.file.path().display(),
                    error = %err
                );
            }
        }
        outcome
    }
}

pub struct MealStore {
    file: SnapshotFile,
    default_subjects: Vec<String>,
    snapshot: MealsSnapshot,
    last_updated: Option<DateTime<Utc>>,
    origin: LoadOrigin,
}

impl MealStore {
    /// Adopts the snapshot file as-is when it holds any JSON document. A
    /// missing, unreadable or syntactically broken file is replaced by an
    /// all-unfed schedule for `default_subjects`. Never fails: a write error
    /// here only gets logged.
    pub fn initialize(file: SnapshotFile, default_subjects: Vec<String>) -> Self {
        match file.load() {
            Ok(snapshot) => {
                info!(
                    event = "meals_loaded",
                    path = %file.path().display(),
                    subjects = snapshot.subjects.len()
                );
                Self {
                    file,
                    default_subjects,
                    snapshot,
                    last_updated: None,
                    origin: LoadOrigin::Loaded,
                }
            }
            Err(err) => {
                warn!(
                    event = "meals_default_synthesized",
                    path = %file.path().display(),
                    error = %err
                );
                let snapshot = MealsSnapshot::with_defaults(&default_subjects);
                let store = Self {
                    file,
                    default_subjects,
                    snapshot,
                    last_updated: None,
                    origin: LoadOrigin::Synthesized,
                };
                let _ = store.pending_write().write();
                store
            }
        }
    }

    pub fn origin(&self) -> LoadOrigin {
        self.origin
    }

    pub fn file(&self) -> &SnapshotFile {
        &self.file
    }

    pub fn snapshot(&self) -> &MealsSnapshot {
        &self.snapshot
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Applies the update in memory and hands back the write to perform. On
    /// error nothing changes, including `last_updated`.
    pub fn record_feeding(
        &mut self,
        subject: &str,
        day: &str,
        meal: &str,
        fed: bool,
    ) -> Result<PendingWrite, CoreError> {
        self.snapshot.set_fed(subject, day, meal, fed)?;
        self.touch();
        info!(
            event = "feeding_recorded",
            subject = subject,
            day = day,
            meal = meal,
            fed = fed
        );
        Ok(self.pending_write())
    }

    pub fn reset(&mut self) -> PendingWrite {
        self.snapshot = MealsSnapshot::with_defaults(&self.default_subjects);
        self.touch();
        info!(event = "meals_reset", subjects = self.default_subjects.len());
        self.pending_write()
    }

    /// The write owed at shutdown. A store that was never mutated leaves the
    /// file as it found it.
    pub fn flush(&self) -> Option<PendingWrite> {
        self.last_updated.map(|_| self.pending_write())
    }

    fn pending_write(&self) -> PendingWrite {
        PendingWrite {
            file: self.file.clone(),
            snapshot: self.snapshot.clone(),
        }
    }

    fn touch(&mut self) {
        self.last_updated = Some(next_timestamp(self.last_updated, Utc::now()));
    }
}

/// Clock reading that is strictly later than `previous`, even when the wall
/// clock stalls or steps backwards.
fn next_timestamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}
