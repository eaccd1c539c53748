//! Query Executor
//!
//! Executes a [`SearchFilter`] against a snapshot of the log index,
//! performing:
//! 1. Candidate selection from the type/location buckets
//! 2. Date windowing on the ordered candidates
//! 3. Text filtering
//! 4. Ordering and limit
//!
//! # Execution Pipeline
//!
//! ```text
//! Filter → Buckets (∩) → Date window → Text match → Order → Limit → Result
//! ```
//!
//! The engine never mutates the store; it works on an immutable index
//! snapshot so a search sees one consistent state.

use crate::index::LogIndex;
use crate::query::filter::{contains_ignore_case, SearchFilter, SortOrder};
use crate::storage::{DateRange, Entry, RecordStore, StorageError, StorageResult};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Read-only search over a log index snapshot
#[derive(Debug, Clone)]
pub struct QueryEngine {
    index: Arc<LogIndex>,
}

impl QueryEngine {
    /// Create an engine over an index snapshot
    pub fn new(index: Arc<LogIndex>) -> Self {
        Self { index }
    }

    /// Create an engine over the store's current index
    pub fn for_store(store: &RecordStore) -> StorageResult<Self> {
        Ok(Self::new(store.index_snapshot()?))
    }

    /// Run a search, returning entries in the requested order
    pub fn search(&self, filter: &SearchFilter, order: SortOrder) -> Vec<Entry> {
        let dates = self.candidate_dates(filter);
        let needle = filter.content_contains.as_deref();
        let limit = filter.limit.unwrap_or(usize::MAX);

        let ordered: Box<dyn Iterator<Item = NaiveDate>> = match order {
            SortOrder::Ascending => Box::new(dates.into_iter()),
            SortOrder::Descending => Box::new(dates.into_iter().rev()),
        };

        ordered
            .filter_map(|date| self.index.by_date.get(&date))
            .filter(|entry| needle.map_or(true, |n| contains_ignore_case(&entry.search_text(), n)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of entries matching a filter (ignores `limit`)
    pub fn count(&self, filter: &SearchFilter) -> usize {
        let unlimited = SearchFilter {
            limit: None,
            ..filter.clone()
        };
        self.search(&unlimited, SortOrder::Ascending).len()
    }

    /// Point lookup through the index
    pub fn get_by_date(&self, date: NaiveDate) -> StorageResult<Entry> {
        self.index
            .by_date
            .get(&date)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("no entry for {}", date)))
    }

    /// Keyword search across every field, newest first
    pub fn search_keyword(&self, keyword: &str) -> Vec<Entry> {
        self.search(
            &SearchFilter::new().content_contains(keyword),
            SortOrder::Descending,
        )
    }

    /// Entries from the last `days` days, newest first
    pub fn recent(&self, today: NaiveDate, days: u32) -> Vec<Entry> {
        self.search(&SearchFilter::last_days(today, days), SortOrder::Descending)
    }

    /// Ascending dates satisfying the label and date filters
    fn candidate_dates(&self, filter: &SearchFilter) -> BTreeSet<NaiveDate> {
        let range = filter.effective_range();
        if range.is_some_and(|r| r.is_empty()) {
            return BTreeSet::new();
        }

        let mut buckets = Vec::with_capacity(2);
        if let Some(ref training_type) = filter.training_type {
            match self.index.by_type.find(training_type) {
                Some(dates) => buckets.push(dates),
                None => return BTreeSet::new(),
            }
        }
        if let Some(ref location) = filter.location {
            match self.index.by_location.find(location) {
                Some(dates) => buckets.push(dates),
                None => return BTreeSet::new(),
            }
        }

        // Start from the smallest bucket and intersect with the rest
        buckets.sort_by_key(|dates| dates.len());
        match buckets.split_first() {
            Some((smallest, rest)) => smallest
                .iter()
                .copied()
                .filter(|date| within(range, *date))
                .filter(|date| rest.iter().all(|bucket| bucket.contains(date)))
                .collect(),
            None => match range {
                Some(r) => self.index.by_date.range(r.start..=r.end).map(|(d, _)| *d).collect(),
                None => self.index.by_date.keys().copied().collect(),
            },
        }
    }
}

fn within(range: Option<DateRange>, date: NaiveDate) -> bool {
    range.map_or(true, |r| r.contains(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::parse_date;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn sample_engine() -> QueryEngine {
        let entries = vec![
            Entry::new(date("2026-01-30"), "pool", "Jing'an").content("DYN 4x50"),
            Entry::new(date("2026-02-01"), "pool", "Jing'an").content("DNF 100m"),
            Entry::new(date("2026-02-03"), "land", "home").content("CO2 table"),
            Entry::new(date("2026-02-05"), "STA", "home").content("static 5:30, felt good"),
            Entry::new(date("2026-02-07"), "pool", "Oriental").content("DYNB 150m"),
            Entry::new(date("2026-02-08"), "pool", "Jing'an").content("rest swim"),
        ];
        QueryEngine::new(Arc::new(LogIndex::build(&entries)))
    }

    fn dates(entries: &[Entry]) -> Vec<String> {
        entries.iter().map(|e| e.date.to_string()).collect()
    }

    #[test]
    fn test_date_range_inclusive_ascending() {
        let engine = sample_engine();
        let filter = SearchFilter::new()
            .date_range(DateRange::parse("2026-02-01", "2026-02-07").unwrap());

        let results = engine.search(&filter, SortOrder::Ascending);
        assert_eq!(
            dates(&results),
            vec!["2026-02-01", "2026-02-03", "2026-02-05", "2026-02-07"]
        );
    }

    #[test]
    fn test_descending_order() {
        let engine = sample_engine();
        let results = engine.search(&SearchFilter::new(), SortOrder::Descending);
        assert_eq!(results.first().unwrap().date, date("2026-02-08"));
        assert_eq!(results.last().unwrap().date, date("2026-01-30"));
    }

    #[test]
    fn test_type_and_location_intersection() {
        let engine = sample_engine();
        let filter = SearchFilter::new().training_type("pool").location("Jing'an");

        let results = engine.search(&filter, SortOrder::Ascending);
        assert_eq!(dates(&results), vec!["2026-01-30", "2026-02-01", "2026-02-08"]);

        let filter = filter.date_range(DateRange::parse("2026-02-01", "2026-02-28").unwrap());
        assert_eq!(engine.count(&filter), 2);
    }

    #[test]
    fn test_unknown_label_yields_nothing() {
        let engine = sample_engine();
        let filter = SearchFilter::new().training_type("CWT");
        assert!(engine.search(&filter, SortOrder::Ascending).is_empty());
    }

    #[test]
    fn test_exact_date() {
        let engine = sample_engine();
        let results = engine.search(
            &SearchFilter::new().date(date("2026-02-03")),
            SortOrder::Descending,
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].training_type, "land");

        let results = engine.search(
            &SearchFilter::new().date(date("2026-02-04")),
            SortOrder::Descending,
        );
        assert!(results.is_empty());
    }

    #[test]
    fn test_content_contains_and_limit() {
        let engine = sample_engine();

        let results = engine.search_keyword("dyn");
        assert_eq!(dates(&results), vec!["2026-02-07", "2026-01-30"]);

        let filter = SearchFilter::new().training_type("pool").limit(2);
        let results = engine.search(&filter, SortOrder::Descending);
        assert_eq!(dates(&results), vec!["2026-02-08", "2026-02-07"]);
        assert_eq!(engine.count(&filter), 4);
    }

    #[test]
    fn test_inverted_range_matches_nothing() {
        let engine = sample_engine();
        let filter = SearchFilter::new()
            .date_range(DateRange::parse("2026-02-07", "2026-02-01").unwrap());
        assert!(engine.search(&filter, SortOrder::Ascending).is_empty());
    }

    #[test]
    fn test_recent_and_get_by_date() {
        let engine = sample_engine();
        let results = engine.recent(date("2026-02-08"), 3);
        assert_eq!(dates(&results), vec!["2026-02-08", "2026-02-07", "2026-02-05"]);

        assert_eq!(engine.get_by_date(date("2026-02-05")).unwrap().training_type, "STA");
        assert!(matches!(
            engine.get_by_date(date("2026-02-06")),
            Err(StorageError::NotFound(_))
        ));
    }
}
