//! Aggregator - summaries over an inclusive date range

use super::{mean, Trend, TREND_WINDOW};
use crate::records::LungCapacityLog;
use crate::storage::{DateRange, RecordStore, StorageResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Lung-capacity statistics for a window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LungSummary {
    /// Number of dated records in range
    pub records: usize,
    pub mean: f64,
    pub max: u32,
    /// Last (up to) seven daily maxima, oldest first
    pub recent: Vec<u32>,
    pub trend: Trend,
}

impl LungSummary {
    /// Summarize daily maxima given in ascending date order
    pub fn from_values(values: &[u32]) -> Self {
        let as_f64: Vec<f64> = values.iter().map(|v| f64::from(*v)).collect();
        let tail = values.len().saturating_sub(TREND_WINDOW);

        Self {
            records: values.len(),
            mean: mean(&as_f64),
            max: values.iter().copied().max().unwrap_or(0),
            recent: values[tail..].to_vec(),
            trend: Trend::classify(&as_f64),
        }
    }
}

/// Everything known about one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub range: DateRange,
    pub total_entries: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_location: BTreeMap<String, usize>,
    pub total_duration_minutes: f64,
    pub lung_capacity: LungSummary,
}

/// Read-only statistics over the store and the lung-capacity log
pub struct Aggregator<'a> {
    store: &'a RecordStore,
    lung: &'a LungCapacityLog,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a RecordStore, lung: &'a LungCapacityLog) -> Self {
        Self { store, lung }
    }

    /// Summarize an inclusive range; an empty range yields zeros
    pub fn summarize(&self, range: DateRange) -> StorageResult<Summary> {
        let entries = self.store.all()?;

        let mut total_entries = 0;
        let mut total_duration_minutes = 0.0;
        let mut by_type = BTreeMap::new();
        let mut by_location = BTreeMap::new();

        for entry in entries.range(range) {
            total_entries += 1;
            total_duration_minutes += entry.duration_minutes.unwrap_or(0.0);
            *by_type.entry(entry.training_type.clone()).or_insert(0) += 1;
            *by_location.entry(entry.location.clone()).or_insert(0) += 1;
        }

        let lung_values: Vec<u32> = self
            .lung
            .records_in(range)?
            .iter()
            .map(|r| r.max_today)
            .collect();

        Ok(Summary {
            range,
            total_entries,
            by_type,
            by_location,
            total_duration_minutes,
            lung_capacity: LungSummary::from_values(&lung_values),
        })
    }

    /// Summarize the last `days` days up to and including `today`
    pub fn summarize_last_days(&self, today: NaiveDate, days: u32) -> StorageResult<Summary> {
        self.summarize(DateRange::last_days(today, days))
    }
}
