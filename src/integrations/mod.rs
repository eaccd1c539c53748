//! Ingestion Adapters
//!
//! Normalize external input shapes into training records:
//! - Spreadsheet rows (CSV), including lung-capacity sheets
//! - Markdown training notes
//! - Externally generated daily report files
//!
//! Per-item problems are soft: each rejected row, document or file is
//! recorded in a [`BatchReport`] and the batch carries on. Only a storage
//! IO failure aborts a batch.

mod csv_import;
mod markdown;
mod reports;

pub use csv_import::{CsvImporter, LungCsvImporter};
pub use markdown::{MarkdownImporter, ParsedNote};
pub use reports::{RecordDatabase, ReportEntry, ReportScanner, RECORD_DATABASE_FILE};

use crate::storage::{Entry, StorageError, StorageResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// Why an item was not imported
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("no date found")]
    MissingDate,

    #[error("unparseable date '{0}'")]
    UnparseableDate(String),

    #[error("entry already exists for {0}")]
    Duplicate(NaiveDate),

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("no usable measurements")]
    NoMeasurements,

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("unreadable: {0}")]
    Unreadable(String),
}

impl SkipReason {
    /// Map a per-item store outcome onto a skip reason
    ///
    /// Returns `None` for errors that must abort the batch.
    pub fn from_store_error(err: &StorageError) -> Option<Self> {
        match err {
            StorageError::DuplicateKey(date) => Some(SkipReason::Duplicate(*date)),
            StorageError::Validation(msg) => Some(SkipReason::Invalid(msg.clone())),
            StorageError::InvalidEvent(event) => Some(SkipReason::Invalid(event.clone())),
            _ => None,
        }
    }
}

/// One item that was not imported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    /// Row number, file path or other locator
    pub item: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub imported: usize,
    pub skipped: Vec<SkippedItem>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a skipped item
    pub fn skip(&mut self, item: impl Into<String>, reason: SkipReason) {
        let item = item.into();
        tracing::warn!("Skipping {}: {}", item, reason);
        self.skipped.push(SkippedItem { item, reason });
    }

    /// Number of items examined
    pub fn total(&self) -> usize {
        self.imported + self.skipped.len()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: BatchReport) {
        self.imported += other.imported;
        self.skipped.extend(other.skipped);
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imported {}, skipped {}", self.imported, self.skipped.len())
    }
}

/// Hand a batch of labelled entries to the store and fold the outcomes
/// into `report`
pub(crate) fn store_batch(
    store: &crate::storage::RecordStore,
    items: Vec<(String, Entry)>,
    overwrite: bool,
    report: &mut BatchReport,
) -> StorageResult<()> {
    if items.is_empty() {
        return Ok(());
    }

    let (labels, entries): (Vec<String>, Vec<Entry>) = items.into_iter().unzip();
    let outcomes = store.add_all(entries, overwrite)?;

    for (label, outcome) in labels.into_iter().zip(outcomes) {
        match outcome {
            Ok(_) => report.imported += 1,
            Err(e) => match SkipReason::from_store_error(&e) {
                Some(reason) => report.skip(label, reason),
                None => return Err(e),
            },
        }
    }
    Ok(())
}

/// Date formats accepted from spreadsheets, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M"];

/// Parse a date cell in any of the supported formats
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}
