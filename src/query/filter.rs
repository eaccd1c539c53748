//! Search filters
//!
//! All filters are optional and AND-combined. An empty filter matches
//! every entry.

use crate::storage::{DateRange, Entry, StorageError, StorageResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Result ordering; callers always choose one explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first (statistics consumers)
    Ascending,
    /// Newest first (human-facing listings)
    Descending,
}

impl FromStr for SortOrder {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(StorageError::validation(format!(
                "unknown sort order '{}' (expected asc or desc)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "asc"),
            SortOrder::Descending => write!(f, "desc"),
        }
    }
}

/// Filter for training log searches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Exact date
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Inclusive date range
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Exact training type label
    #[serde(default)]
    pub training_type: Option<String>,
    /// Exact location label
    #[serde(default)]
    pub location: Option<String>,
    /// Case-insensitive substring of the entry's text rendering
    #[serde(default)]
    pub content_contains: Option<String>,
    /// Maximum number of results, applied after ordering
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn training_type(mut self, training_type: impl Into<String>) -> Self {
        self.training_type = Some(training_type.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn content_contains(mut self, needle: impl Into<String>) -> Self {
        self.content_contains = Some(needle.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Entries in one calendar month
    pub fn month(year: i32, month: u32) -> StorageResult<Self> {
        Ok(Self::new().date_range(DateRange::month(year, month)?))
    }

    /// Entries from the last `days` days up to and including `today`
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        Self::new().date_range(DateRange::last_days(today, days))
    }

    /// The effective date window after combining `date` and `date_range`
    ///
    /// `None` means unbounded. An empty range means nothing can match.
    pub fn effective_range(&self) -> Option<DateRange> {
        match (self.date, self.date_range) {
            (None, None) => None,
            (Some(date), None) => Some(DateRange::day(date)),
            (None, Some(range)) => Some(range),
            (Some(date), Some(range)) => {
                if range.contains(date) {
                    Some(DateRange::day(date))
                } else {
                    // Inverted range: matches nothing
                    Some(DateRange::new(date, date.pred_opt().unwrap_or(NaiveDate::MIN)))
                }
            }
        }
    }

    /// Check every filter against one entry
    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(range) = self.effective_range() {
            if !range.contains(entry.date) {
                return false;
            }
        }

        if let Some(ref training_type) = self.training_type {
            if &entry.training_type != training_type {
                return false;
            }
        }

        if let Some(ref location) = self.location {
            if &entry.location != location {
                return false;
            }
        }

        if let Some(ref needle) = self.content_contains {
            if !contains_ignore_case(&entry.search_text(), needle) {
                return false;
            }
        }

        true
    }
}

/// Case-insensitive substring test using Unicode lowercase on both sides
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::parse_date;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let entry = Entry::new(date("2026-02-04"), "pool", "home");
        assert!(SearchFilter::new().matches(&entry));
    }

    #[test]
    fn test_filters_are_and_combined() {
        let entry = Entry::new(date("2026-02-04"), "pool", "home").content("DYN 75m");

        let filter = SearchFilter::new().training_type("pool").location("home");
        assert!(filter.matches(&entry));

        let filter = SearchFilter::new().training_type("pool").location("gym");
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn test_content_contains_is_case_insensitive() {
        let entry = Entry::new(date("2026-02-04"), "pool", "home").content("DYN 75m, felt Great");

        assert!(SearchFilter::new().content_contains("great").matches(&entry));
        assert!(SearchFilter::new().content_contains("dyn").matches(&entry));
        assert!(SearchFilter::new().content_contains("HOME").matches(&entry));
        assert!(!SearchFilter::new().content_contains("STA").matches(&entry));
    }

    #[test]
    fn test_date_and_range_combination() {
        let range = DateRange::parse("2026-02-01", "2026-02-07").unwrap();

        let inside = SearchFilter::new().date(date("2026-02-03")).date_range(range);
        assert_eq!(inside.effective_range(), Some(DateRange::day(date("2026-02-03"))));

        let outside = SearchFilter::new().date(date("2026-02-09")).date_range(range);
        assert!(outside.effective_range().unwrap().is_empty());
        let entry = Entry::new(date("2026-02-09"), "pool", "home");
        assert!(!outside.matches(&entry));
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_month_filter() {
        let filter = SearchFilter::month(2026, 2).unwrap();
        assert!(filter.matches(&Entry::new(date("2026-02-28"), "pool", "home")));
        assert!(!filter.matches(&Entry::new(date("2026-03-01"), "pool", "home")));
    }
}
