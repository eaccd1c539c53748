//! Lung-capacity log
//!
//! Per-date measurement records (ml) plus a global running best that only
//! ever increases, regardless of the order dates are added in.

use crate::storage::types::deserialize_timestamp;
use crate::storage::{DateRange, JsonDocument, Mutation, StorageError, StorageResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub const LUNG_CAPACITY_FILE: &str = "lung_capacity.json";

/// Measurements taken on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LungCapacityRecord {
    pub date: NaiveDate,
    pub measurements: Vec<u32>,
    pub max_today: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// The lung-capacity document
///
/// Loading sorts records by date and folds repeated dates into one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "LungCapacityDocument")]
pub struct LungCapacityState {
    #[serde(default)]
    pub pb: u32,
    #[serde(default)]
    pub pb_date: Option<NaiveDate>,
    /// Ascending by date, one record per date
    #[serde(default)]
    pub records: Vec<LungCapacityRecord>,
}

/// On-disk shape as written by older tools: records in append order
#[derive(Deserialize)]
struct LungCapacityDocument {
    #[serde(default)]
    pb: u32,
    #[serde(default)]
    pb_date: Option<NaiveDate>,
    #[serde(default)]
    records: Vec<LungCapacityRecord>,
}

impl From<LungCapacityDocument> for LungCapacityState {
    fn from(mut doc: LungCapacityDocument) -> Self {
        doc.records.sort_by_key(|r| r.date);

        let mut records: Vec<LungCapacityRecord> = Vec::with_capacity(doc.records.len());
        for record in doc.records {
            match records.last_mut() {
                Some(last) if last.date == record.date => {
                    last.measurements.extend(record.measurements);
                    last.max_today = last.max_today.max(record.max_today);
                    if !record.notes.is_empty() {
                        if !last.notes.is_empty() {
                            last.notes.push_str("; ");
                        }
                        last.notes.push_str(&record.notes);
                    }
                }
                _ => records.push(record),
            }
        }

        let mut state = Self {
            pb: doc.pb,
            pb_date: doc.pb_date,
            records,
        };
        let best = state
            .records
            .iter()
            .max_by_key(|r| (r.max_today, std::cmp::Reverse(r.date)));
        if let Some(best) = best {
            if best.max_today > state.pb {
                state.pb = best.max_today;
                state.pb_date = Some(best.date);
            }
        }
        if state.pb_date.is_none() {
            state.pb_date = state.records.iter().find(|r| r.max_today == state.pb).map(|r| r.date);
        }
        state
    }
}

impl LungCapacityState {
    pub fn get(&self, date: NaiveDate) -> Option<&LungCapacityRecord> {
        self.records
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Records inside an inclusive range, ascending
    pub fn in_range(&self, range: DateRange) -> impl Iterator<Item = &LungCapacityRecord> {
        self.records.iter().filter(move |r| range.contains(r.date))
    }

    fn merge(&mut self, input: LungInput) -> StorageResult<LungCapacityRecord> {
        let measurements = valid_measurements(input.date, &input.measurements)?;
        let notes = input.notes.trim();

        let record = match self.records.binary_search_by_key(&input.date, |r| r.date) {
            Ok(i) => {
                let existing = &mut self.records[i];
                existing.measurements.extend(measurements);
                existing.max_today = existing.measurements.iter().copied().max().unwrap_or(0);
                if !notes.is_empty() {
                    if !existing.notes.is_empty() {
                        existing.notes.push_str("; ");
                    }
                    existing.notes.push_str(notes);
                }
                existing.clone()
            }
            Err(i) => {
                let record = LungCapacityRecord {
                    date: input.date,
                    max_today: measurements.iter().copied().max().unwrap_or(0),
                    measurements,
                    notes: notes.to_string(),
                    created_at: Utc::now(),
                };
                self.records.insert(i, record.clone());
                record
            }
        };

        if record.max_today > self.pb {
            self.pb = record.max_today;
            self.pb_date = Some(record.date);
        }
        Ok(record)
    }
}

/// Zero and negative readings are dropped; at least one must remain
fn valid_measurements(date: NaiveDate, raw: &[i64]) -> StorageResult<Vec<u32>> {
    let mut kept = Vec::with_capacity(raw.len());
    for &ml in raw.iter().filter(|ml| **ml > 0) {
        let ml = u32::try_from(ml).map_err(|_| {
            StorageError::validation(format!("measurement {} ml on {} is out of range", ml, date))
        })?;
        kept.push(ml);
    }

    if kept.is_empty() {
        return Err(StorageError::validation(format!(
            "no positive lung-capacity measurement for {}",
            date
        )));
    }
    Ok(kept)
}

/// Parse a measurement list such as `6428, 6462 6632`
pub fn parse_measurements(raw: &str) -> StorageResult<Vec<i64>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.round() as i64)
                .ok_or_else(|| StorageError::validation(format!("measurement '{}' is not a number", s)))
        })
        .collect()
}

/// One day's input to the log
#[derive(Debug, Clone, PartialEq)]
pub struct LungInput {
    pub date: NaiveDate,
    pub measurements: Vec<i64>,
    pub notes: String,
}

/// Lung-capacity log backed by `lung_capacity.json`
pub struct LungCapacityLog {
    doc: JsonDocument<LungCapacityState>,
}

impl LungCapacityLog {
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        Ok(Self {
            doc: JsonDocument::open(path, LungCapacityState::default)?,
        })
    }

    /// Record measurements for a date, merging into an existing record
    pub fn add(&self, date: NaiveDate, measurements: &[i64], notes: &str) -> StorageResult<LungCapacityRecord> {
        let input = LungInput {
            date,
            measurements: measurements.to_vec(),
            notes: notes.to_string(),
        };
        let record = self
            .doc
            .update(|state| state.merge(input).map(Mutation::Commit))?;

        tracing::debug!("Recorded lung capacity for {}: max {} ml", date, record.max_today);
        Ok(record)
    }

    /// Merge many days with a single write; each input gets its own outcome
    pub fn add_all(
        &self,
        inputs: Vec<LungInput>,
    ) -> StorageResult<Vec<StorageResult<LungCapacityRecord>>> {
        self.doc.update(|state| {
            let outcomes: Vec<_> = inputs.into_iter().map(|input| state.merge(input)).collect();
            if outcomes.iter().any(Result::is_ok) {
                Ok(Mutation::Commit(outcomes))
            } else {
                Ok(Mutation::Discard(outcomes))
            }
        })
    }

    pub fn get(&self, date: NaiveDate) -> StorageResult<LungCapacityRecord> {
        self.doc
            .snapshot()?
            .get(date)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("no lung-capacity record for {}", date)))
    }

    /// Running best and the date it was set
    pub fn personal_best(&self) -> StorageResult<(u32, Option<NaiveDate>)> {
        let state = self.doc.snapshot()?;
        Ok((state.pb, state.pb_date))
    }

    pub fn records_in(&self, range: DateRange) -> StorageResult<Vec<LungCapacityRecord>> {
        Ok(self.doc.snapshot()?.in_range(range).cloned().collect())
    }

    pub fn snapshot(&self) -> StorageResult<Arc<LungCapacityState>> {
        self.doc.snapshot()
    }

    pub fn reload(&self) -> StorageResult<()> {
        self.doc.reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{parse_date, read_json};
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_zero_values_dropped() {
        let dir = tempdir().unwrap();
        let log = LungCapacityLog::open(dir.path().join(LUNG_CAPACITY_FILE)).unwrap();

        let record = log.add(date("2026-02-04"), &[6428, 0, 6632, -1], "").unwrap();
        assert_eq!(record.measurements, vec![6428, 6632]);
        assert_eq!(record.max_today, 6632);

        let err = log.add(date("2026-02-05"), &[0, 0], "").unwrap_err();
        assert!(err.is_validation());
        assert!(log.get(date("2026-02-05")).is_err());
    }

    #[test]
    fn test_pb_is_monotonic_across_date_order() {
        let dir = tempdir().unwrap();
        let log = LungCapacityLog::open(dir.path().join(LUNG_CAPACITY_FILE)).unwrap();

        log.add(date("2026-02-10"), &[7000], "").unwrap();
        log.add(date("2026-02-01"), &[6500], "").unwrap();
        assert_eq!(log.personal_best().unwrap(), (7000, Some(date("2026-02-10"))));

        log.add(date("2026-01-15"), &[7100], "").unwrap();
        assert_eq!(log.personal_best().unwrap(), (7100, Some(date("2026-01-15"))));

        let dates: Vec<_> = log.snapshot().unwrap().records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date("2026-01-15"), date("2026-02-01"), date("2026-02-10")]);
    }

    #[test]
    fn test_same_date_merges() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LUNG_CAPACITY_FILE);
        let log = LungCapacityLog::open(&path).unwrap();

        log.add(date("2026-02-04"), &[6400], "morning").unwrap();
        let record = log.add(date("2026-02-04"), &[6500, 6450], "evening").unwrap();

        assert_eq!(record.measurements, vec![6400, 6500, 6450]);
        assert_eq!(record.max_today, 6500);
        assert_eq!(record.notes, "morning; evening");
        assert_eq!(log.snapshot().unwrap().records.len(), 1);

        let on_disk: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(on_disk["pb"], 6500);
        assert_eq!(on_disk["pb_date"], "2026-02-04");
        assert_eq!(on_disk["records"][0]["max_today"], 6500);
    }

    #[test]
    fn test_add_all_reports_each_outcome() {
        let dir = tempdir().unwrap();
        let log = LungCapacityLog::open(dir.path().join(LUNG_CAPACITY_FILE)).unwrap();

        let outcomes = log
            .add_all(vec![
                LungInput {
                    date: date("2026-02-01"),
                    measurements: vec![5200],
                    notes: String::new(),
                },
                LungInput {
                    date: date("2026-02-02"),
                    measurements: vec![0],
                    notes: String::new(),
                },
            ])
            .unwrap();

        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_err());
        assert_eq!(log.snapshot().unwrap().records.len(), 1);
    }

    #[test]
    fn test_parse_measurements() {
        assert_eq!(parse_measurements("6428, 6462 6632").unwrap(), vec![6428, 6462, 6632]);
        assert_eq!(parse_measurements("6428.6").unwrap(), vec![6429]);
        assert!(parse_measurements("6428,lots").unwrap_err().is_validation());
    }

    #[test]
    fn test_records_in_range() {
        let dir = tempdir().unwrap();
        let log = LungCapacityLog::open(dir.path().join(LUNG_CAPACITY_FILE)).unwrap();
        for (day, ml) in [("2026-01-31", 6000), ("2026-02-01", 6100), ("2026-02-07", 6200), ("2026-02-08", 6300)] {
            log.add(date(day), &[ml], "").unwrap();
        }

        let range = DateRange::parse("2026-02-01", "2026-02-07").unwrap();
        let values: Vec<_> = log.records_in(range).unwrap().iter().map(|r| r.max_today).collect();
        assert_eq!(values, vec![6100, 6200]);
    }

    #[test]
    fn test_open_document_in_append_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LUNG_CAPACITY_FILE);
        let doc = r#"{"records":[
            {"date":"2026-02-04","measurements":[6428,6462],"max_today":6462,"notes":"",
             "created_at":"2026-02-04T21:15:03.123456"},
            {"date":"2026-02-01","measurements":[6300],"max_today":6300,"notes":"am",
             "created_at":"2026-02-01T07:00:00"},
            {"date":"2026-02-04","measurements":[6632],"max_today":6632,"notes":"pm",
             "created_at":"2026-02-04T22:00:00.5"}
        ],"pb":7962}"#;
        std::fs::write(&path, doc).unwrap();

        let log = LungCapacityLog::open(&path).unwrap();
        let state = log.snapshot().unwrap();
        let dates: Vec<_> = state.records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date("2026-02-01"), date("2026-02-04")]);

        let merged = log.get(date("2026-02-04")).unwrap();
        assert_eq!(merged.measurements, vec![6428, 6462, 6632]);
        assert_eq!(merged.max_today, 6632);
        assert_eq!(merged.notes, "pm");
        assert_eq!(log.personal_best().unwrap(), (7962, None));

        log.add(date("2026-02-05"), &[8000], "").unwrap();
        let reread: LungCapacityState = read_json(&path).unwrap();
        assert_eq!(reread.pb, 8000);
        assert_eq!(reread.records.len(), 3);
    }
}
