//! Core data types for the training record store
//!
//! This module defines the fundamental types used throughout the storage layer:
//! - `Entry`: One dated training/health record, the store's atomic unit
//! - `DateRange`: An inclusive calendar-date interval for queries and statistics

use crate::storage::error::{StorageError, StorageResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Label used when an entry arrives without a training type
pub const DEFAULT_TRAINING_TYPE: &str = "uncategorized";

/// Label used when an entry arrives without a location
pub const DEFAULT_LOCATION: &str = "unknown";

fn default_training_type() -> String {
    DEFAULT_TRAINING_TYPE.to_string()
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

/// A single dated training record
///
/// The `date` is the unique key: the store holds at most one entry per day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    /// Calendar day this entry belongs to
    pub date: NaiveDate,
    /// Open label, e.g. "pool", "陆地训练", "STA"
    #[serde(default = "default_training_type")]
    pub training_type: String,
    /// Open label, e.g. "Jing'an Sports Center"
    #[serde(default = "default_location")]
    pub location: String,
    /// Session length in minutes, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    /// Free text description of the session
    #[serde(default)]
    pub content: String,
    /// Open metric map (distance, attempts, heart_rate, ...)
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
    /// Free text remarks
    #[serde(default)]
    pub notes: String,
    /// When the entry was first recorded
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Create an entry with required fields
    pub fn new(
        date: NaiveDate,
        training_type: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            date,
            training_type: training_type.into(),
            location: location.into(),
            duration_minutes: None,
            content: String::new(),
            metrics: BTreeMap::new(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Builder: set duration in minutes
    pub fn duration(mut self, minutes: f64) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    /// Builder: set content text
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Builder: add a metric
    pub fn metric(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }

    /// Builder: set notes
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Builder: set creation timestamp
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Normalize labels and check field constraints
    ///
    /// Blank labels fall back to the defaults; a negative or non-finite
    /// duration is rejected.
    pub fn validate(mut self) -> StorageResult<Self> {
        self.training_type = normalize_label(&self.training_type, DEFAULT_TRAINING_TYPE);
        self.location = normalize_label(&self.location, DEFAULT_LOCATION);

        if let Some(minutes) = self.duration_minutes {
            if !minutes.is_finite() || minutes < 0.0 {
                return Err(StorageError::validation(format!(
                    "duration for {} must be a non-negative number, got {}",
                    self.date, minutes
                )));
            }
        }

        Ok(self)
    }

    /// Canonical text rendering used for substring search
    ///
    /// One field per line; metrics rendered as `key: value`.
    pub fn search_text(&self) -> String {
        let mut text = String::with_capacity(self.content.len() + 128);
        push_line(&mut text, &self.date.to_string());
        push_line(&mut text, &self.training_type);
        push_line(&mut text, &self.location);
        if let Some(minutes) = self.duration_minutes {
            push_line(&mut text, &format!("{} min", minutes));
        }
        push_line(&mut text, &self.content);
        push_line(&mut text, &self.notes);
        for (key, value) in &self.metrics {
            let rendered = match value {
                serde_json::Value::String(s) => format!("{}: {}", key, s),
                other => format!("{}: {}", key, other),
            };
            push_line(&mut text, &rendered);
        }
        text
    }
}

fn push_line(text: &mut String, line: &str) {
    text.push_str(line);
    text.push('\n');
}

/// Parse a stored timestamp
///
/// RFC 3339 values keep their offset; values written without one
/// (`2026-02-04T21:15:03.123456`) are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// serde `deserialize_with` helper for [`parse_timestamp`]
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

/// Optional variant of [`deserialize_timestamp`]; `null` stays `None`
pub(crate) fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
        None => Ok(None),
    }
}

fn normalize_label(label: &str, fallback: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a strict ISO-8601 calendar date (`YYYY-MM-DD`)
pub fn parse_date(s: &str) -> StorageResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| StorageError::validation(format!("malformed date '{}': {}", s.trim(), e)))
}

/// Inclusive calendar-date interval: [start, end]
///
/// A range whose start lies after its end is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a new range
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse both endpoints from ISO strings
    pub fn parse(start: &str, end: &str) -> StorageResult<Self> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?))
    }

    /// The range covering `days` days back from `today`, both ends included
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MIN),
            end: today,
        }
    }

    /// The range covering one calendar month
    pub fn month(year: i32, month: u32) -> StorageResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| StorageError::validation(format!("invalid month {}-{}", year, month)))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| StorageError::validation(format!("invalid month {}-{}", year, month)))?;

        Ok(Self {
            start,
            end: next - Duration::days(1),
        })
    }

    /// A single-day range
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Check if a date falls within this range
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// True when no date can match
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Number of calendar days covered
    pub fn num_days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
