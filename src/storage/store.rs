//! Record Store - the authoritative, date-keyed training log
//!
//! Orchestrates the training log document and its derived index:
//! - Write path: Entry → validate → document RMW (atomic persist) → index update
//! - Read path: snapshot → ordered iteration / point lookup
//!
//! Writers are serialized by a store-level lock so the document and the
//! index always see mutations in the same order.

use crate::index::{IndexManager, IndexStats, LogIndex};
use crate::storage::document::{JsonDocument, Mutation};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{
    deserialize_optional_timestamp, deserialize_timestamp, DateRange, Entry,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File name of the training log document
pub const TRAINING_LOG_FILE: &str = "training_logs.json";

/// File name of the persisted log index
pub const INDEX_FILE: &str = "logs_index.json";

/// Document-level timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_timestamp"
    )]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for LogMetadata {
    fn default() -> Self {
        Self {
            created: Utc::now(),
            last_updated: None,
        }
    }
}

/// On-disk shape: `{"logs": [Entry...], "metadata": {...}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TrainingLogDocument {
    #[serde(default)]
    logs: Vec<Entry>,
    #[serde(default)]
    metadata: LogMetadata,
}

/// In-memory shape: entries keyed by date
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "TrainingLogDocument", into = "TrainingLogDocument")]
pub struct StoreState {
    entries: BTreeMap<NaiveDate, Entry>,
    metadata: LogMetadata,
}

impl From<TrainingLogDocument> for StoreState {
    fn from(doc: TrainingLogDocument) -> Self {
        let mut entries = BTreeMap::new();
        for entry in doc.logs {
            match entries.entry(entry.date) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                btree_map::Entry::Occupied(_) => {
                    tracing::warn!("Duplicate log for {} in document, keeping the first", entry.date);
                }
            }
        }

        Self {
            entries,
            metadata: doc.metadata,
        }
    }
}

impl From<StoreState> for TrainingLogDocument {
    fn from(state: StoreState) -> Self {
        Self {
            logs: state.entries.into_values().collect(),
            metadata: state.metadata,
        }
    }
}

/// Snapshot of the store's entries, ascending by date
///
/// Iteration is lazy and can be restarted any number of times; the
/// snapshot is unaffected by later writes.
#[derive(Debug, Clone)]
pub struct Entries {
    state: Arc<StoreState>,
}

impl Entries {
    /// Iterate entries in ascending date order
    pub fn iter(&self) -> btree_map::Values<'_, NaiveDate, Entry> {
        self.state.entries.values()
    }

    /// Iterate entries inside an inclusive date range
    pub fn range(&self, range: DateRange) -> impl DoubleEndedIterator<Item = &Entry> {
        let bounds = if range.is_empty() {
            None
        } else {
            Some(range.start..=range.end)
        };
        bounds
            .into_iter()
            .flat_map(move |b| self.state.entries.range(b).map(|(_, e)| e))
    }

    /// Look up one date in the snapshot
    pub fn get(&self, date: NaiveDate) -> Option<&Entry> {
        self.state.entries.get(&date)
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Entries {
    type Item = &'a Entry;
    type IntoIter = btree_map::Values<'a, NaiveDate, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The authoritative training log with its derived index
pub struct RecordStore {
    doc: JsonDocument<StoreState>,
    index: IndexManager,
    /// Serializes document + index mutations
    writer: Mutex<()>,
}

impl RecordStore {
    /// Open (or create) a store in `dir`
    ///
    /// Loads `training_logs.json`, then opens `logs_index.json` and heals it
    /// against the loaded entries.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open_files(dir.join(TRAINING_LOG_FILE), dir.join(INDEX_FILE))
    }

    /// Open a store with explicit document and index paths
    pub fn open_files(log_path: PathBuf, index_path: PathBuf) -> StorageResult<Self> {
        let doc = JsonDocument::open(log_path, StoreState::default)?;
        let entries = Entries {
            state: doc.snapshot()?,
        };
        let index = IndexManager::open(index_path, &entries)?;

        tracing::info!("Opened training log with {} entries", entries.len());

        Ok(Self {
            doc,
            index,
            writer: Mutex::new(()),
        })
    }

    /// Add an entry
    ///
    /// Fails with [`StorageError::DuplicateKey`] if the date is taken and
    /// `overwrite` is false. Returns the stored entry.
    pub fn add(&self, entry: Entry, overwrite: bool) -> StorageResult<Entry> {
        let entry = entry.validate()?;
        let _writer = self.writer.lock()?;

        let stored = self.doc.update(|state| {
            if !overwrite && state.entries.contains_key(&entry.date) {
                return Err(StorageError::DuplicateKey(entry.date));
            }
            state.entries.insert(entry.date, entry.clone());
            state.metadata.last_updated = Some(Utc::now());
            Ok(Mutation::Commit(entry))
        })?;

        self.index.apply(&stored)?;
        tracing::debug!("Stored entry for {}", stored.date);
        Ok(stored)
    }

    /// Add a batch of entries in one read-modify-write cycle
    ///
    /// Each entry gets its own outcome (validation failure, duplicate, or
    /// the stored entry). The document is written once; an IO failure
    /// aborts the whole batch and nothing becomes visible.
    pub fn add_all(
        &self,
        entries: impl IntoIterator<Item = Entry>,
        overwrite: bool,
    ) -> StorageResult<Vec<StorageResult<Entry>>> {
        let _writer = self.writer.lock()?;

        let (outcomes, stored) = self.doc.update(|state| {
            let mut outcomes = Vec::new();
            let mut stored = Vec::new();

            for entry in entries {
                let outcome = entry.validate().and_then(|entry| {
                    if !overwrite && state.entries.contains_key(&entry.date) {
                        return Err(StorageError::DuplicateKey(entry.date));
                    }
                    state.entries.insert(entry.date, entry.clone());
                    Ok(entry)
                });
                if let Ok(entry) = &outcome {
                    stored.push(entry.clone());
                }
                outcomes.push(outcome);
            }

            if stored.is_empty() {
                Ok(Mutation::Discard((outcomes, stored)))
            } else {
                state.metadata.last_updated = Some(Utc::now());
                Ok(Mutation::Commit((outcomes, stored)))
            }
        })?;

        self.index.apply_all(&stored)?;
        Ok(outcomes)
    }

    /// Get the entry for a date
    pub fn get(&self, date: NaiveDate) -> StorageResult<Entry> {
        self.doc
            .snapshot()?
            .entries
            .get(&date)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("no entry for {}", date)))
    }

    /// Check if a date has an entry
    pub fn contains(&self, date: NaiveDate) -> StorageResult<bool> {
        Ok(self.doc.snapshot()?.entries.contains_key(&date))
    }

    /// Snapshot of all entries, ascending by date
    pub fn all(&self) -> StorageResult<Entries> {
        Ok(Entries {
            state: self.doc.snapshot()?,
        })
    }

    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.doc.snapshot()?.entries.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Document timestamps
    pub fn metadata(&self) -> StorageResult<LogMetadata> {
        Ok(self.doc.snapshot()?.metadata.clone())
    }

    /// The derived index
    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    /// Snapshot of the derived index
    pub fn index_snapshot(&self) -> StorageResult<Arc<LogIndex>> {
        self.index.snapshot()
    }

    /// Recompute the index from the store
    pub fn rebuild_index(&self) -> StorageResult<IndexStats> {
        let _writer = self.writer.lock()?;
        let entries = self.all()?;
        self.index.rebuild(&entries)
    }

    /// Rebuild the index if it disagrees with the store
    ///
    /// Returns true if a rebuild happened.
    pub fn ensure_index_consistent(&self) -> StorageResult<bool> {
        let _writer = self.writer.lock()?;
        let entries = self.all()?;
        self.index.ensure_consistent(&entries)
    }

    /// Re-read the training log from disk and heal the index
    pub fn reload(&self) -> StorageResult<()> {
        let _writer = self.writer.lock()?;
        self.doc.reload()?;
        let entries = self.all()?;
        self.index.ensure_consistent(&entries)?;
        Ok(())
    }

    /// Path of the training log document
    pub fn path(&self) -> &Path {
        self.doc.path()
    }
}
