//! Training Log Index Structures
//!
//! Derived lookup structures over the record store:
//!
//! - **by_date**: date → Entry
//! - **by_type**: training type → ordered set of dates ([`LabelIndex`])
//! - **by_location**: location → ordered set of dates ([`LabelIndex`])
//!
//! # Architecture
//!
//! ```text
//! Query: "pool sessions at Jing'an in February"
//!        ↓
//! by_type["pool"] ∩ by_location["Jing'an"] → [02-01, 02-05, 02-09]
//!        ↓
//! range [02-01, 02-28] on the candidates
//!        ↓
//! by_date lookup → entries
//! ```
//!
//! The index is a pure function of the store's entries. `LogIndex::build`
//! over the store always reproduces what incremental maintenance produced.

mod label_index;
mod manager;

pub use label_index::LabelIndex;
pub use manager::IndexManager;

use crate::storage::Entry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics derived from the indexed dates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of indexed days
    pub total_days: usize,
    /// Earliest indexed date
    pub earliest_date: Option<NaiveDate>,
    /// Latest indexed date
    pub latest_date: Option<NaiveDate>,
    /// Number of distinct training types
    pub training_types: usize,
    /// Number of distinct locations
    pub locations: usize,
}

/// The full set of derived indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogIndex {
    pub by_date: BTreeMap<NaiveDate, Entry>,
    pub by_type: LabelIndex,
    pub by_location: LabelIndex,
    pub stats: IndexStats,
}

impl LogIndex {
    /// Build an index from scratch
    pub fn build<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            index.insert_unchecked(entry);
        }
        index.refresh_stats();
        index
    }

    /// Insert or replace an entry
    ///
    /// Any existing memberships for the date are removed first, so an
    /// overwrite that changes type or location leaves no stale buckets.
    pub fn upsert(&mut self, entry: &Entry) {
        if let Some(previous) = self.by_date.get(&entry.date) {
            let (old_type, old_location) = (previous.training_type.clone(), previous.location.clone());
            self.by_type.remove(&old_type, entry.date);
            self.by_location.remove(&old_location, entry.date);
        }
        self.insert_unchecked(entry);
        self.refresh_stats();
    }

    fn insert_unchecked(&mut self, entry: &Entry) {
        self.by_type.add(&entry.training_type, entry.date);
        self.by_location.add(&entry.location, entry.date);
        self.by_date.insert(entry.date, entry.clone());
    }

    fn refresh_stats(&mut self) {
        self.stats = IndexStats {
            total_days: self.by_date.len(),
            earliest_date: self.by_date.keys().next().copied(),
            latest_date: self.by_date.keys().next_back().copied(),
            training_types: self.by_type.label_count(),
            locations: self.by_location.label_count(),
        };
    }

    /// Check the structural invariants, returning a description of the first violation
    pub fn check_invariants(&self) -> Result<(), String> {
        for (date, entry) in &self.by_date {
            if *date != entry.date {
                return Err(format!("by_date key {} holds entry for {}", date, entry.date));
            }
            let types = self.by_type.labels_for(*date);
            if types != [entry.training_type.as_str()] {
                return Err(format!(
                    "{} expected in type bucket '{}', found in {:?}",
                    date, entry.training_type, types
                ));
            }
            let locations = self.by_location.labels_for(*date);
            if locations != [entry.location.as_str()] {
                return Err(format!(
                    "{} expected in location bucket '{}', found in {:?}",
                    date, entry.location, locations
                ));
            }
        }

        let memberships = self.by_type.membership_count() + self.by_location.membership_count();
        if memberships != 2 * self.by_date.len() {
            return Err(format!(
                "{} bucket memberships for {} dates",
                memberships,
                self.by_date.len()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    #[test]
    fn test_build_populates_all_structures() {
        let entries = vec![
            Entry::new(d(1), "pool", "Jing'an"),
            Entry::new(d(2), "land", "home"),
            Entry::new(d(3), "pool", "home"),
        ];
        let index = LogIndex::build(&entries);

        assert_eq!(index.by_date.len(), 3);
        assert_eq!(index.by_type.find("pool").unwrap().len(), 2);
        assert_eq!(index.by_location.find("home").unwrap().len(), 2);
        assert_eq!(index.stats.earliest_date, Some(d(1)));
        assert_eq!(index.stats.latest_date, Some(d(3)));
        assert!(index.check_invariants().is_ok());
    }

    #[test]
    fn test_upsert_moves_buckets() {
        let mut index = LogIndex::build(&[Entry::new(d(1), "pool", "Jing'an")]);
        let moved = Entry::new(d(1), "land", "home");
        index.upsert(&moved);

        assert!(!index.by_type.has_label("pool"));
        assert!(!index.by_location.has_label("Jing'an"));
        assert!(index.by_type.find("land").unwrap().contains(&d(1)));
        assert!(index.check_invariants().is_ok());
        assert_eq!(index, LogIndex::build(&[moved]));
    }

    #[test]
    fn test_check_invariants_detects_stale_bucket() {
        let mut index = LogIndex::build(&[Entry::new(d(1), "pool", "Jing'an")]);
        index.by_type.add("land", d(1));

        let err = index.check_invariants().unwrap_err();
        assert!(err.contains("type bucket"));
    }
}
