// src/store.rs
//! Time-series store.
//!
//! One JSON artifact holds the full observation history. Each cycle:
//! `expire_if_stale` → `load` → [`append`] → `save`. `save` always rewrites
//! the whole artifact, atomically.
//!
//! Retention is coarse: once the *artifact* is older than the retention age
//! the whole history goes, regardless of how recent individual observations
//! are. The artifact's creation time lives in a `<artifact>.created` sidecar,
//! since replacing the artifact on every save resets filesystem timestamps.
//! Artifacts written before the sidecar existed fall back to the filesystem
//! creation (or modification) time, which the next save pins into a sidecar.
//!
//! An artifact that no longer parses is moved aside to `<artifact>.corrupt`
//! by `quarantine`, so collection restarts from an empty history.

use std::{
    fs, io,
    path::PathBuf,
    time::SystemTime,
};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use tracing::{debug, info, warn};

use crate::config::consts::{CORRUPT_SUFFIX, CREATED_SUFFIX, RETENTION_DAYS, TIMESTAMP_FORMAT};
use crate::data::{now_stamp, truncate_to_secs, Observation, ObservationSet};
use crate::error::StoreError;
use crate::file::{remove_if_exists, sidecar_path, write_atomic};

pub trait Store {
    /// Delete the artifact if `reference - created > max_age`.
    /// `Ok(true)` when something was deleted; a missing artifact is `Ok(false)`.
    fn expire_if_stale(&mut self, reference: NaiveDateTime) -> Result<bool, StoreError>;

    /// `Ok(None)` when no artifact exists yet.
    fn load(&self) -> Result<Option<ObservationSet>, StoreError>;

    /// Overwrite the artifact with the full `set`.
    fn save(&mut self, set: &ObservationSet) -> Result<(), StoreError>;

    /// Move an unreadable artifact out of the way so the next `save` starts a
    /// fresh history. Returns where the old contents went.
    fn quarantine(&mut self) -> Result<PathBuf, StoreError>;
}

/// `set` followed by `batch`, as a new set.
pub fn append(set: &ObservationSet, batch: &[Observation]) -> ObservationSet {
    set.append(batch)
}

fn default_max_age() -> TimeDelta {
    TimeDelta::days(RETENTION_DAYS)
}

fn format_stamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/* ---------------- File-backed store ---------------- */

pub struct JsonFileStore {
    path: PathBuf,
    max_age: TimeDelta,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), max_age: default_max_age() }
    }

    pub fn with_max_age(mut self, max_age: TimeDelta) -> Self {
        self.max_age = max_age;
        self
    }

    fn created_path(&self) -> PathBuf {
        sidecar_path(&self.path, CREATED_SUFFIX)
    }

    /// When the current artifact was first created, `None` if there is none.
    pub fn created_at(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        let meta = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path: self.path.clone(), source }),
        };

        let marker = self.created_path();
        if let Ok(text) = fs::read_to_string(&marker) {
            match NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT) {
                Ok(t) => return Ok(Some(t)),
                Err(e) => {
                    warn!(path = %marker.display(), error = %e, "unreadable creation marker, using filesystem time");
                }
            }
        }

        let fs_time: SystemTime = meta
            .created()
            .or_else(|_| meta.modified())
            .map_err(|source| StoreError::Read { path: self.path.clone(), source })?;
        Ok(Some(truncate_to_secs(DateTime::<Local>::from(fs_time).naive_local())))
    }
}

impl Store for JsonFileStore {
    fn expire_if_stale(&mut self, reference: NaiveDateTime) -> Result<bool, StoreError> {
        let marker = self.created_path();
        let Some(created) = self.created_at()? else {
            // Marker without an artifact is left over from an interrupted expiry.
            remove_if_exists(&marker).map_err(|source| StoreError::Remove { path: marker, source })?;
            return Ok(false);
        };

        let age = reference - created;
        if age <= self.max_age {
            debug!(path = %self.path.display(), age_secs = age.num_seconds(), "artifact still fresh");
            return Ok(false);
        }

        remove_if_exists(&self.path)
            .map_err(|source| StoreError::Remove { path: self.path.clone(), source })?;
        remove_if_exists(&marker).map_err(|source| StoreError::Remove { path: marker, source })?;
        info!(
            path = %self.path.display(),
            created = %format_stamp(created),
            age_days = age.num_days(),
            "stale artifact deleted, history reset"
        );
        Ok(true)
    }

    fn load(&self) -> Result<Option<ObservationSet>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no artifact yet");
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Read { path: self.path.clone(), source }),
        };

        let set: ObservationSet = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path: self.path.clone(), source })?;
        debug!(path = %self.path.display(), observations = set.len(), "artifact loaded");
        Ok(Some(set))
    }

    fn save(&mut self, set: &ObservationSet) -> Result<(), StoreError> {
        let fresh = !self.path.exists();
        let marker = self.created_path();
        // Pin the creation time before the rename below resets it.
        let created = if fresh {
            Some(now_stamp())
        } else if !marker.exists() {
            self.created_at()?
        } else {
            None
        };
        let json = serde_json::to_vec_pretty(set).map_err(StoreError::Encode)?;

        write_atomic(&self.path, &json)
            .map_err(|source| StoreError::Write { path: self.path.clone(), source })?;

        if let Some(created) = created {
            write_atomic(&marker, format_stamp(created).as_bytes())
                .map_err(|source| StoreError::Write { path: marker, source })?;
        }

        debug!(path = %self.path.display(), observations = set.len(), fresh, "artifact saved");
        Ok(())
    }

    fn quarantine(&mut self) -> Result<PathBuf, StoreError> {
        let dest = sidecar_path(&self.path, CORRUPT_SUFFIX);
        fs::rename(&self.path, &dest)
            .map_err(|source| StoreError::Quarantine { path: self.path.clone(), source })?;
        let marker = self.created_path();
        remove_if_exists(&marker).map_err(|source| StoreError::Remove { path: marker, source })?;
        warn!(from = %self.path.display(), to = %dest.display(), "corrupt artifact moved aside");
        Ok(dest)
    }
}

/* ---------------- In-memory store ---------------- */

const MEMORY_PATH: &str = "<memory>";

/// Store double that keeps the serialized artifact text in memory, so loads
/// go through the same normalization as the file store.
pub struct MemoryStore {
    raw: Option<String>,
    quarantined: Option<String>,
    created: Option<NaiveDateTime>,
    max_age: TimeDelta,
    fail_writes: bool,
    saves: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self { raw: None, quarantined: None, created: None, max_age: default_max_age(), fail_writes: false, saves: 0 }
    }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Start from existing artifact text, e.g. a legacy or corrupt file.
    pub fn with_raw(raw: impl Into<String>, created: NaiveDateTime) -> Self {
        Self { raw: Some(raw.into()), created: Some(created), ..Self::default() }
    }

    pub fn with_set(set: &ObservationSet, created: NaiveDateTime) -> Result<Self, StoreError> {
        let raw = serde_json::to_string_pretty(set).map_err(StoreError::Encode)?;
        Ok(Self::with_raw(raw, created))
    }

    pub fn with_max_age(mut self, max_age: TimeDelta) -> Self {
        self.max_age = max_age;
        self
    }

    /// Every `save` fails with a write error; contents stay as they were.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn raw(&self) -> Option<&str> { self.raw.as_deref() }
    /// Text last moved aside by `quarantine`.
    pub fn quarantined(&self) -> Option<&str> { self.quarantined.as_deref() }
    pub fn save_count(&self) -> usize { self.saves }
}

impl Store for MemoryStore {
    fn expire_if_stale(&mut self, reference: NaiveDateTime) -> Result<bool, StoreError> {
        match (self.raw.as_ref(), self.created) {
            (Some(_), Some(created)) if reference - created > self.max_age => {
                self.raw = None;
                self.created = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn load(&self) -> Result<Option<ObservationSet>, StoreError> {
        match &self.raw {
            None => Ok(None),
            Some(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|source| StoreError::Corrupt { path: PathBuf::from(MEMORY_PATH), source }),
        }
    }

    fn save(&mut self, set: &ObservationSet) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write {
                path: PathBuf::from(MEMORY_PATH),
                source: io::Error::other("simulated write failure"),
            });
        }
        self.raw = Some(serde_json::to_string_pretty(set).map_err(StoreError::Encode)?);
        if self.created.is_none() {
            self.created = Some(now_stamp());
        }
        self.saves += 1;
        Ok(())
    }

    fn quarantine(&mut self) -> Result<PathBuf, StoreError> {
        self.quarantined = self.raw.take();
        self.created = None;
        Ok(PathBuf::from(format!("{MEMORY_PATH}.{CORRUPT_SUFFIX}")))
    }
}
