//! Logbook - one handle over every document
//!
//! Owns the record store (with its index), personal bests, the
//! lung-capacity log and the record database, all opened from an explicit
//! [`Config`]. There is no process-wide state.

use crate::config::Config;
use crate::index::IndexStats;
use crate::integrations::{
    BatchReport, CsvImporter, LungCsvImporter, MarkdownImporter, RecordDatabase, ReportScanner,
    RECORD_DATABASE_FILE,
};
use crate::query::{QueryEngine, SearchFilter, SortOrder};
use crate::records::{
    Event, LungCapacityLog, LungCapacityRecord, PbUpdate, PersonalBest, PersonalBestBook,
    LUNG_CAPACITY_FILE, PERSONAL_BEST_FILE,
};
use crate::stats::{Aggregator, Summary};
use crate::storage::{DateRange, Entry, RecordStore, StorageResult};
use chrono::{Datelike, Local, NaiveDate};
use std::path::Path;

pub struct Logbook {
    config: Config,
    store: RecordStore,
    personal_bests: PersonalBestBook,
    lung: LungCapacityLog,
    records: RecordDatabase,
}

impl Logbook {
    /// Open every document under the configured data directory
    pub fn open(config: Config) -> StorageResult<Self> {
        let dir = config.data_dir();
        std::fs::create_dir_all(&dir)?;

        let store = RecordStore::open(&dir)?;
        let personal_bests = PersonalBestBook::open(dir.join(PERSONAL_BEST_FILE))?;
        let lung = LungCapacityLog::open(dir.join(LUNG_CAPACITY_FILE))?;
        let records = RecordDatabase::open(dir.join(RECORD_DATABASE_FILE))?;

        tracing::info!("Opened logbook in {:?}", dir);
        Ok(Self {
            config,
            store,
            personal_bests,
            lung,
            records,
        })
    }

    /// Open with default settings rooted at `dir`
    pub fn open_dir(dir: &Path) -> StorageResult<Self> {
        let mut config = Config::default();
        config.storage.data_dir = dir.to_string_lossy().to_string();
        Self::open(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn personal_bests(&self) -> &PersonalBestBook {
        &self.personal_bests
    }

    pub fn lung_capacity(&self) -> &LungCapacityLog {
        &self.lung
    }

    pub fn record_database(&self) -> &RecordDatabase {
        &self.records
    }

    // ==================== Training log ====================

    pub fn add(&self, entry: Entry, overwrite: bool) -> StorageResult<Entry> {
        self.store.add(entry, overwrite)
    }

    pub fn get(&self, date: NaiveDate) -> StorageResult<Entry> {
        self.store.get(date)
    }

    pub fn search(&self, filter: &SearchFilter, order: SortOrder) -> StorageResult<Vec<Entry>> {
        Ok(self.query_engine()?.search(filter, order))
    }

    pub fn query_engine(&self) -> StorageResult<QueryEngine> {
        QueryEngine::for_store(&self.store)
    }

    pub fn rebuild_index(&self) -> StorageResult<IndexStats> {
        self.store.rebuild_index()
    }

    // ==================== Records ====================

    pub fn update_personal_best(
        &self,
        event: &str,
        value: &str,
        date: NaiveDate,
        location: &str,
    ) -> StorageResult<PbUpdate> {
        self.personal_bests.update_code(event, value, date, location)
    }

    pub fn all_personal_bests(&self) -> StorageResult<Vec<(Event, PersonalBest)>> {
        self.personal_bests.all()
    }

    pub fn add_lung_capacity(
        &self,
        date: NaiveDate,
        measurements: &[i64],
        notes: &str,
    ) -> StorageResult<LungCapacityRecord> {
        self.lung.add(date, measurements, notes)
    }

    // ==================== Statistics ====================

    pub fn summarize(&self, range: DateRange) -> StorageResult<Summary> {
        Aggregator::new(&self.store, &self.lung).summarize(range)
    }

    pub fn summarize_last_days(&self, today: NaiveDate, days: u32) -> StorageResult<Summary> {
        Aggregator::new(&self.store, &self.lung).summarize_last_days(today, days)
    }

    // ==================== Ingestion ====================

    pub fn import_spreadsheet(&self, path: &Path) -> StorageResult<BatchReport> {
        CsvImporter::new()
            .with_overwrite(self.config.ingest.overwrite)
            .import(&self.store, path)
    }

    pub fn import_lung_spreadsheet(&self, path: &Path) -> StorageResult<BatchReport> {
        LungCsvImporter::new().import(&self.lung, path)
    }

    /// Import a markdown file, or every markdown file under a directory
    pub fn import_markdown(&self, path: &Path) -> StorageResult<BatchReport> {
        let year = self
            .config
            .ingest
            .reference_year
            .unwrap_or_else(|| Local::now().year());
        let importer = MarkdownImporter::new(year)?.with_overwrite(self.config.ingest.overwrite);

        if path.is_dir() {
            importer.import_dir(&self.store, path)
        } else {
            importer.import_file(&self.store, path)
        }
    }

    fn report_scanner(&self) -> StorageResult<ReportScanner> {
        Ok(ReportScanner::new(self.config.reports_dir())?
            .with_prefix(self.config.ingest.report_prefix.clone())
            .with_extensions(self.config.ingest.report_extensions.clone()))
    }

    /// Scan the reports directory and refresh the training log snapshot
    pub fn scan_reports(&self) -> StorageResult<BatchReport> {
        let report = self.report_scanner()?.scan(&self.records)?;
        self.records.sync_training_logs(&self.store)?;
        Ok(report)
    }

    /// Drop the report cache and rebuild it from the filesystem
    pub fn rebuild_reports(&self) -> StorageResult<BatchReport> {
        let report = self.report_scanner()?.rebuild(&self.records)?;
        self.records.sync_training_logs(&self.store)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::parse_date;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_nothing_until_written() {
        let dir = tempdir().unwrap();
        let book = Logbook::open_dir(&dir.path().join("data")).unwrap();

        assert!(book.store().is_empty().unwrap());
        assert!(!dir.path().join("data").join(PERSONAL_BEST_FILE).exists());
    }

    #[test]
    fn test_open_existing_data_dir() {
        let dir = tempdir().unwrap();
        let data = dir.path();
        std::fs::write(
            data.join(crate::storage::store::TRAINING_LOG_FILE),
            r#"{"logs":[{"date":"2026-02-04","training_type":"pool","location":"home",
                "content":"DYN","created_at":"2026-02-04T21:15:03.123456"}],
                "metadata":{"created":"2026-01-01T08:00:00.000001"}}"#,
        )
        .unwrap();
        std::fs::write(
            data.join(LUNG_CAPACITY_FILE),
            r#"{"records":[{"date":"2026-02-04","measurements":[6428,6632],"max_today":6632,
                "notes":"","created_at":"2026-02-04T21:20:00.5"}],"pb":7962}"#,
        )
        .unwrap();
        std::fs::write(data.join(RECORD_DATABASE_FILE), "{ truncated").unwrap();

        let book = Logbook::open_dir(data).unwrap();
        let date = parse_date("2026-02-04").unwrap();
        assert_eq!(book.get(date).unwrap().content, "DYN");
        assert_eq!(book.lung_capacity().get(date).unwrap().max_today, 6632);
        assert!(book.record_database().reports().unwrap().is_empty());

        book.add(Entry::new(parse_date("2026-02-05").unwrap(), "land", "home"), false)
            .unwrap();
        assert_eq!(book.store().len().unwrap(), 2);
    }

    #[test]
    fn test_scan_reports_uses_config() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data").to_string_lossy().to_string();
        let reports = config.reports_dir();
        std::fs::create_dir_all(&reports).unwrap();
        std::fs::write(reports.join("dashboard_2026-02-04.md"), "report").unwrap();
        std::fs::write(reports.join("weekly_2026-02-04.md"), "not scanned").unwrap();

        let book = Logbook::open(config).unwrap();
        book.add(Entry::new(parse_date("2026-02-04").unwrap(), "pool", "home"), false)
            .unwrap();
        let report = book.scan_reports().unwrap();

        assert_eq!(report.imported, 1);
        let state = book.record_database().snapshot().unwrap();
        assert_eq!(state.daily_reports.len(), 1);
        assert_eq!(state.training_logs.len(), 1);
    }

    #[test]
    fn test_markdown_reference_year() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("note.md");
        std::fs::write(&notes, "03月01日\n跑步 30分钟").unwrap();

        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data").to_string_lossy().to_string();
        config.ingest.reference_year = Some(2025);

        let book = Logbook::open(config).unwrap();
        assert_eq!(book.import_markdown(&notes).unwrap().imported, 1);

        let entry = book.get(parse_date("2025-03-01").unwrap()).unwrap();
        assert_eq!(entry.training_type, "跑步");
        assert_eq!(entry.duration_minutes, Some(30.0));
    }
}
