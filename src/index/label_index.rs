//! Label Index - Inverted index from an open label to the dates carrying it
//!
//! Maps "label" → ordered set of dates. Used twice by the log index: once
//! for training types and once for locations.
//!
//! # Example
//! ```ignore
//! // Which days were spent at the pool?
//! let days = location_index.find("Jing'an Sports Center");
//! // days = [2026-02-01, 2026-02-03, 2026-02-05]
//! ```
//!
//! # Design Notes
//! - Buckets are `BTreeSet`s so dates come back in calendar order
//! - Empty buckets are dropped, so a label exists iff some date carries it

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Inverted index for one label dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelIndex {
    /// label → set of dates
    buckets: BTreeMap<String, BTreeSet<NaiveDate>>,
}

impl LabelIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a date to a label's bucket
    ///
    /// Returns true if the date was not already present.
    pub fn add(&mut self, label: &str, date: NaiveDate) -> bool {
        self.buckets
            .entry(label.to_string())
            .or_default()
            .insert(date)
    }

    /// Remove a date from a label's bucket, dropping the bucket when empty
    pub fn remove(&mut self, label: &str, date: NaiveDate) -> bool {
        let Some(dates) = self.buckets.get_mut(label) else {
            return false;
        };

        let removed = dates.remove(&date);
        if dates.is_empty() {
            self.buckets.remove(label);
        }
        removed
    }

    /// All dates carrying a label, ascending
    pub fn find(&self, label: &str) -> Option<&BTreeSet<NaiveDate>> {
        self.buckets.get(label)
    }

    /// Labels that contain the given date
    pub fn labels_for(&self, date: NaiveDate) -> Vec<&str> {
        self.buckets
            .iter()
            .filter(|(_, dates)| dates.contains(&date))
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// All known labels, sorted
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Label → number of dates
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.buckets
            .iter()
            .map(|(label, dates)| (label.clone(), dates.len()))
            .collect()
    }

    /// Number of distinct labels
    pub fn label_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of (label, date) memberships
    pub fn membership_count(&self) -> usize {
        self.buckets.values().map(BTreeSet::len).sum()
    }

    /// Check if a label exists
    pub fn has_label(&self, label: &str) -> bool {
        self.buckets.contains_key(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    #[test]
    fn test_label_index_creation() {
        let index = LabelIndex::new();
        assert_eq!(index.label_count(), 0);
        assert_eq!(index.membership_count(), 0);
    }

    #[test]
    fn test_add_and_find() {
        let mut index = LabelIndex::new();

        assert!(index.add("pool", d(3)));
        assert!(index.add("pool", d(1)));
        assert!(!index.add("pool", d(1)));
        index.add("land", d(2));

        let pool: Vec<_> = index.find("pool").unwrap().iter().copied().collect();
        assert_eq!(pool, vec![d(1), d(3)]);
        assert_eq!(index.find("land").unwrap().len(), 1);
        assert!(index.find("rest").is_none());
    }

    #[test]
    fn test_remove_drops_empty_bucket() {
        let mut index = LabelIndex::new();
        index.add("pool", d(1));

        assert!(index.remove("pool", d(1)));
        assert!(!index.has_label("pool"));
        assert!(!index.remove("pool", d(1)));
    }

    #[test]
    fn test_counts_and_labels_for() {
        let mut index = LabelIndex::new();
        index.add("DYN", d(1));
        index.add("DNF", d(2));
        index.add("STA", d(3));
        index.add("DYN", d(2));

        assert_eq!(index.membership_count(), 4);
        assert_eq!(index.find("DYN").unwrap().iter().copied().collect::<Vec<_>>(), vec![d(1), d(2)]);

        let counts = index.counts();
        assert_eq!(counts["STA"], 1);
        assert_eq!(index.labels_for(d(2)), vec!["DNF", "DYN"]);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut index = LabelIndex::new();
        index.add("pool", d(1));

        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json, serde_json::json!({"pool": ["2026-02-01"]}));

        let restored: LabelIndex = serde_json::from_value(json).unwrap();
        assert_eq!(restored, index);
    }
}
