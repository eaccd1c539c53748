//! External report scanning
//!
//! Daily reports are generated elsewhere and dropped into a directory as
//! files named after their date (e.g. `dashboard_2026-02-04.md`). The
//! scanner caches their contents in `records_database.json` next to a
//! date-keyed snapshot of the training log. The whole database is derived
//! data and can be deleted and rebuilt at any time.

use super::{BatchReport, SkipReason};
use crate::storage::{
    parse_date, read_json, Entry, JsonDocument, Mutation, RecordStore, StorageError,
    StorageResult,
};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const RECORD_DATABASE_FILE: &str = "records_database.json";

/// One cached report file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub file: String,
    pub date: NaiveDate,
    pub content: String,
    /// Content length in characters
    pub size: usize,
    /// Number of newline characters
    pub lines: usize,
}

impl ReportEntry {
    fn new(path: &Path, date: NaiveDate, content: String) -> Self {
        Self {
            file: path.display().to_string(),
            date,
            size: content.chars().count(),
            lines: content.matches('\n').count(),
            content,
        }
    }
}

/// The record database document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDatabaseState {
    #[serde(default)]
    pub daily_reports: BTreeMap<NaiveDate, ReportEntry>,
    #[serde(default)]
    pub training_logs: BTreeMap<NaiveDate, Entry>,
}

/// Report cache plus training log snapshot, backed by `records_database.json`
pub struct RecordDatabase {
    doc: JsonDocument<RecordDatabaseState>,
}

impl RecordDatabase {
    /// Open the database; a corrupt file starts over from an empty cache
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            match read_json::<RecordDatabaseState>(&path) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Unreadable record database {:?} ({}), starting empty", path, e);
                    RecordDatabaseState::default()
                }
            }
        } else {
            RecordDatabaseState::default()
        };

        Ok(Self {
            doc: JsonDocument::with_state(path, state),
        })
    }

    pub fn get_report(&self, date: NaiveDate) -> StorageResult<ReportEntry> {
        self.doc
            .snapshot()?
            .daily_reports
            .get(&date)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("no report for {}", date)))
    }

    /// Cached reports, ascending by date
    pub fn reports(&self) -> StorageResult<Vec<ReportEntry>> {
        Ok(self.doc.snapshot()?.daily_reports.values().cloned().collect())
    }

    pub fn snapshot(&self) -> StorageResult<Arc<RecordDatabaseState>> {
        self.doc.snapshot()
    }

    /// Upsert scanned reports; `clear` drops everything cached first
    fn store_reports(&self, reports: Vec<ReportEntry>, clear: bool) -> StorageResult<()> {
        self.doc.update(|state| {
            if clear {
                state.daily_reports.clear();
            } else if reports.is_empty() {
                return Ok(Mutation::Discard(()));
            }
            for report in reports {
                state.daily_reports.insert(report.date, report);
            }
            Ok(Mutation::Commit(()))
        })
    }

    /// Replace the training log snapshot with the store's current entries
    pub fn sync_training_logs(&self, store: &RecordStore) -> StorageResult<usize> {
        let entries = store.all()?;
        let logs: BTreeMap<NaiveDate, Entry> =
            entries.iter().map(|e| (e.date, e.clone())).collect();
        let count = logs.len();

        self.doc.update(|state| {
            state.training_logs = logs;
            Ok(Mutation::Commit(()))
        })?;

        tracing::info!("Synced {} training logs into record database", count);
        Ok(count)
    }
}

/// Scans a directory for dated report files
pub struct ReportScanner {
    dir: PathBuf,
    /// Matches the whole stem after the prefix
    date_pattern: Regex,
    /// Only file names starting with this are considered
    prefix: String,
    extensions: Vec<String>,
}

impl ReportScanner {
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let date_pattern = Regex::new(r"^(\d{4}-\d{2}-\d{2})$")
            .map_err(|e| StorageError::validation(format!("bad date pattern: {}", e)))?;
        Ok(Self {
            dir: dir.into(),
            date_pattern,
            prefix: String::new(),
            extensions: vec!["md".to_string()],
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scan and upsert; re-scanning overwrites each date with current contents
    pub fn scan(&self, db: &RecordDatabase) -> StorageResult<BatchReport> {
        let (reports, mut report) = self.collect()?;
        report.imported = reports.len();
        db.store_reports(reports, false)?;
        tracing::info!("Scanned reports in {:?}: {}", self.dir, report);
        Ok(report)
    }

    /// Clear the cache and scan from scratch
    pub fn rebuild(&self, db: &RecordDatabase) -> StorageResult<BatchReport> {
        let (reports, mut report) = self.collect()?;
        report.imported = reports.len();
        db.store_reports(reports, true)?;
        tracing::info!("Rebuilt report cache from {:?}: {}", self.dir, report);
        Ok(report)
    }

    fn collect(&self) -> StorageResult<(Vec<ReportEntry>, BatchReport)> {
        let mut report = BatchReport::new();
        let mut reports = Vec::new();

        if !self.dir.exists() {
            tracing::warn!("Report directory {:?} does not exist", self.dir);
            return Ok((reports, report));
        }

        let mut paths = Vec::new();
        for dirent in std::fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.is_file() && self.is_candidate(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut seen = BTreeSet::new();
        for path in paths {
            let label = path.display().to_string();
            let date = match self.file_date(&path) {
                Ok(date) => date,
                Err(reason) => {
                    report.skip(label, reason);
                    continue;
                }
            };
            if !seen.insert(date) {
                report.skip(label, SkipReason::Duplicate(date));
                continue;
            }

            match std::fs::read_to_string(&path) {
                Ok(content) => reports.push(ReportEntry::new(&path, date, content)),
                Err(e) => report.skip(label, SkipReason::Unreadable(e.to_string())),
            }
        }

        Ok((reports, report))
    }

    fn is_candidate(&self, path: &Path) -> bool {
        let name_ok = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&self.prefix));
        let ext_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        name_ok && ext_ok
    }

    fn file_date(&self, path: &Path) -> Result<NaiveDate, SkipReason> {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        let rest = stem.strip_prefix(self.prefix.as_str()).unwrap_or(stem);
        let raw = self
            .date_pattern
            .find(rest)
            .map(|m| m.as_str())
            .ok_or(SkipReason::MissingDate)?;
        parse_date(raw).map_err(|_| SkipReason::UnparseableDate(raw.to_string()))
    }
}
