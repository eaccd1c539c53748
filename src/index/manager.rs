//! Index Manager - Maintains the derived training log index
//!
//! Provides a unified interface to:
//! - by_date (date → Entry)
//! - by_type (training type → dates)
//! - by_location (location → dates)
//!
//! # Maintenance
//!
//! ```text
//! Store.add(entry)
//!
//! 1. Remove the date from its previous type/location buckets (overwrite)
//! 2. Add the date to the new buckets, replace by_date[date]
//! 3. Refresh derived stats, persist logs_index.json (best effort)
//!
//! Cold start / detected corruption:
//!
//! 1. Load logs_index.json if present
//! 2. Compare against LogIndex::build(store.all())
//! 3. Any difference → rebuild wholesale and persist
//! ```
//!
//! The persisted file is a materialized view. A failed index write is
//! logged and retried on the next mutation; the record store remains the
//! only source of truth.

use crate::index::{IndexStats, LogIndex};
use crate::storage::document::{read_json, write_json_atomic};
use crate::storage::{Entry, StorageError, StorageResult};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

struct IndexState {
    index: Arc<LogIndex>,
    /// Set when the in-memory index is newer than the file
    dirty: bool,
}

/// Owns the in-memory log index and its persisted copy
pub struct IndexManager {
    path: PathBuf,
    state: Mutex<IndexState>,
}

impl IndexManager {
    /// Open the index at `path`, healing it against the store's entries
    pub fn open<'a, I>(path: impl Into<PathBuf>, entries: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = &'a Entry> + Clone,
    {
        let path = path.into();

        let loaded = if path.exists() {
            match read_json::<LogIndex>(&path) {
                Ok(index) => Some(index),
                Err(e) => {
                    tracing::warn!("Unreadable index {:?} ({}), rebuilding", path, e);
                    None
                }
            }
        } else {
            None
        };

        let manager = match loaded {
            Some(index) => Self {
                path,
                state: Mutex::new(IndexState {
                    index: Arc::new(index),
                    dirty: false,
                }),
            },
            None => {
                let manager = Self {
                    path,
                    state: Mutex::new(IndexState {
                        index: Arc::new(LogIndex::build(entries.clone())),
                        dirty: true,
                    }),
                };
                manager.persist_best_effort();
                manager
            }
        };

        manager.ensure_consistent(entries)?;
        Ok(manager)
    }

    /// Path of the persisted index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cheap snapshot of the current index
    pub fn snapshot(&self) -> StorageResult<Arc<LogIndex>> {
        Ok(Arc::clone(&self.state.lock()?.index))
    }

    // ==================== Index Update Methods ====================

    /// Apply one stored entry (insert or overwrite)
    pub fn apply(&self, entry: &Entry) -> StorageResult<()> {
        self.apply_all(std::iter::once(entry))
    }

    /// Apply a batch of stored entries with a single persist
    pub fn apply_all<'a>(&self, entries: impl IntoIterator<Item = &'a Entry>) -> StorageResult<()> {
        {
            let mut state = self.state.lock()?;
            let index = Arc::make_mut(&mut state.index);
            let mut changed = false;
            for entry in entries {
                index.upsert(entry);
                changed = true;
            }
            if !changed {
                return Ok(());
            }
            state.dirty = true;
        }

        self.persist_best_effort();
        Ok(())
    }

    /// Recompute all structures from the store and replace the index wholesale
    pub fn rebuild<'a>(&self, entries: impl IntoIterator<Item = &'a Entry>) -> StorageResult<IndexStats> {
        let fresh = LogIndex::build(entries);
        let stats = fresh.stats.clone();

        {
            let mut state = self.state.lock()?;
            state.index = Arc::new(fresh);
            state.dirty = true;
        }

        self.persist_best_effort();
        tracing::info!(
            "Rebuilt index: {} days, {} types, {} locations",
            stats.total_days,
            stats.training_types,
            stats.locations
        );
        Ok(stats)
    }

    /// Compare the index with the store's entries
    ///
    /// Returns [`StorageError::CorruptIndex`] describing the first difference.
    pub fn verify<'a>(&self, entries: impl IntoIterator<Item = &'a Entry>) -> StorageResult<()> {
        let current = self.snapshot()?;
        let fresh = LogIndex::build(entries);

        if *current == fresh {
            return Ok(());
        }

        Err(StorageError::CorruptIndex(describe_mismatch(&current, &fresh)))
    }

    /// Verify the index, rebuilding it if it is corrupt
    ///
    /// Returns true if a rebuild happened.
    pub fn ensure_consistent<'a, I>(&self, entries: I) -> StorageResult<bool>
    where
        I: IntoIterator<Item = &'a Entry> + Clone,
    {
        match self.verify(entries.clone()) {
            Ok(()) => Ok(false),
            Err(StorageError::CorruptIndex(reason)) => {
                tracing::warn!("Index inconsistent with store ({}), rebuilding", reason);
                self.rebuild(entries)?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    // ==================== Persistence Methods ====================

    /// Persist the index to disk
    pub fn persist(&self) -> StorageResult<()> {
        let mut state = self.state.lock()?;
        if !state.dirty {
            return Ok(());
        }

        write_json_atomic(&self.path, &*state.index)?;
        state.dirty = false;
        Ok(())
    }

    fn persist_best_effort(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!("Failed to persist index {:?}: {}", self.path, e);
        }
    }

    // ==================== Query Methods ====================

    /// Dates recorded with a training type, ascending
    pub fn dates_for_type(&self, training_type: &str) -> StorageResult<Vec<NaiveDate>> {
        let index = self.snapshot()?;
        Ok(index
            .by_type
            .find(training_type)
            .map(|dates| dates.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Dates recorded at a location, ascending
    pub fn dates_for_location(&self, location: &str) -> StorageResult<Vec<NaiveDate>> {
        let index = self.snapshot()?;
        Ok(index
            .by_location
            .find(location)
            .map(|dates| dates.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Known training types, sorted
    pub fn types(&self) -> StorageResult<Vec<String>> {
        Ok(self.snapshot()?.by_type.labels().map(str::to_string).collect())
    }

    /// Known locations, sorted
    pub fn locations(&self) -> StorageResult<Vec<String>> {
        Ok(self.snapshot()?.by_location.labels().map(str::to_string).collect())
    }

    /// Training type → number of days
    pub fn type_counts(&self) -> StorageResult<BTreeMap<String, usize>> {
        Ok(self.snapshot()?.by_type.counts())
    }

    /// Location → number of days
    pub fn location_counts(&self) -> StorageResult<BTreeMap<String, usize>> {
        Ok(self.snapshot()?.by_location.counts())
    }

    /// Get statistics about the index
    pub fn stats(&self) -> StorageResult<IndexStats> {
        Ok(self.snapshot()?.stats.clone())
    }
}

fn describe_mismatch(current: &LogIndex, fresh: &LogIndex) -> String {
    if let Err(violation) = current.check_invariants() {
        return violation;
    }

    for (date, entry) in &fresh.by_date {
        match current.by_date.get(date) {
            None => return format!("{} missing from index", date),
            Some(indexed) if indexed != entry => return format!("{} is stale in index", date),
            Some(_) => {}
        }
    }

    if let Some(date) = current
        .by_date
        .keys()
        .find(|date| !fresh.by_date.contains_key(date))
    {
        return format!("{} indexed but not in store", date);
    }

    "derived stats out of date".to_string()
}
