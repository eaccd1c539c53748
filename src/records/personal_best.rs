//! Personal-best tracking
//!
//! One record per event. Distance events (DNF, DYN, DYNB) hold metres,
//! STA holds elapsed seconds with a `m:ss` rendering. A candidate replaces
//! the stored best only when it is strictly greater; anything else is a
//! successful no-op and nothing is written.

use crate::storage::{JsonDocument, Mutation, StorageError, StorageResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub const PERSONAL_BEST_FILE: &str = "personal_best.json";

/// Competitive event code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Event {
    /// Dynamic no fins
    #[serde(rename = "DNF")]
    Dnf,
    /// Dynamic with monofin
    #[serde(rename = "DYN")]
    Dyn,
    /// Dynamic with bifins
    #[serde(rename = "DYNB")]
    Dynb,
    /// Static apnea
    #[serde(rename = "STA")]
    Sta,
}

impl Event {
    pub const ALL: [Event; 4] = [Event::Dnf, Event::Dyn, Event::Dynb, Event::Sta];

    pub fn code(self) -> &'static str {
        match self {
            Event::Dnf => "DNF",
            Event::Dyn => "DYN",
            Event::Dynb => "DYNB",
            Event::Sta => "STA",
        }
    }

    /// Measured in elapsed time rather than distance
    pub fn is_timed(self) -> bool {
        self == Event::Sta
    }
}

impl FromStr for Event {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DNF" => Ok(Event::Dnf),
            "DYN" => Ok(Event::Dyn),
            "DYNB" => Ok(Event::Dynb),
            "STA" => Ok(Event::Sta),
            _ => Err(StorageError::InvalidEvent(s.trim().to_string())),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Elapsed static apnea time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StaticTime {
    pub seconds: u32,
}

impl StaticTime {
    pub fn from_seconds(seconds: u32) -> Self {
        Self { seconds }
    }
}

impl FromStr for StaticTime {
    type Err = StorageError;

    /// Accepts `m:ss` or a whole number of seconds
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || StorageError::validation(format!("invalid STA time '{}' (expected m:ss or seconds)", raw));

        match raw.split_once(':') {
            Some((minutes, seconds)) => {
                let minutes: u32 = minutes.trim().parse().map_err(|_| invalid())?;
                let seconds: u32 = seconds.trim().parse().map_err(|_| invalid())?;
                if seconds >= 60 {
                    return Err(invalid());
                }
                minutes
                    .checked_mul(60)
                    .and_then(|m| m.checked_add(seconds))
                    .map(Self::from_seconds)
                    .ok_or_else(invalid)
            }
            None => raw.parse().map(Self::from_seconds).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for StaticTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.seconds / 60, self.seconds % 60)
    }
}

/// Stored best for one event
///
/// Serialized as `{"distance", "date", "location"}` or
/// `{"time", "seconds", "date", "location"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersonalBest {
    Time {
        time: String,
        seconds: u32,
        date: Option<NaiveDate>,
        location: Option<String>,
    },
    Distance {
        distance: u32,
        date: Option<NaiveDate>,
        location: Option<String>,
    },
}

impl PersonalBest {
    /// Unset record for an event
    pub fn empty(event: Event) -> Self {
        if event.is_timed() {
            Self::time(StaticTime::from_seconds(0), None, None)
        } else {
            Self::distance(0, None, None)
        }
    }

    pub fn distance(metres: u32, date: Option<NaiveDate>, location: Option<String>) -> Self {
        PersonalBest::Distance {
            distance: metres,
            date,
            location,
        }
    }

    pub fn time(time: StaticTime, date: Option<NaiveDate>, location: Option<String>) -> Self {
        PersonalBest::Time {
            time: time.to_string(),
            seconds: time.seconds,
            date,
            location,
        }
    }

    /// Comparable magnitude: metres or seconds
    pub fn score(&self) -> u32 {
        match self {
            PersonalBest::Distance { distance, .. } => *distance,
            PersonalBest::Time { seconds, .. } => *seconds,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            PersonalBest::Distance { date, .. } | PersonalBest::Time { date, .. } => *date,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            PersonalBest::Distance { location, .. } | PersonalBest::Time { location, .. } => {
                location.as_deref()
            }
        }
    }

    /// Human rendering: `319m` or `9:08`
    pub fn display_value(&self) -> String {
        match self {
            PersonalBest::Distance { distance, .. } => format!("{}m", distance),
            PersonalBest::Time { seconds, .. } => StaticTime::from_seconds(*seconds).to_string(),
        }
    }
}

/// A candidate value parsed for a specific event
fn parse_candidate(event: Event, value: &str) -> StorageResult<u32> {
    if event.is_timed() {
        return Ok(value.parse::<StaticTime>()?.seconds);
    }

    let raw = value.trim();
    let digits = raw.strip_suffix('m').unwrap_or(raw).trim();
    digits.parse::<u32>().map_err(|_| {
        StorageError::validation(format!("invalid {} distance '{}' (expected metres)", event, raw))
    })
}

/// Result of a personal-best update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PbUpdate {
    pub event: Event,
    pub record: PersonalBest,
    /// False when the candidate did not beat the stored best
    pub improved: bool,
}

/// The personal-best document: event code → record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonalBestState {
    records: BTreeMap<Event, PersonalBest>,
}

impl Default for PersonalBestState {
    fn default() -> Self {
        Self {
            records: Event::ALL
                .iter()
                .map(|event| (*event, PersonalBest::empty(*event)))
                .collect(),
        }
    }
}

impl PersonalBestState {
    pub fn get(&self, event: Event) -> PersonalBest {
        self.records
            .get(&event)
            .cloned()
            .unwrap_or_else(|| PersonalBest::empty(event))
    }

    /// Seed a record directly, bypassing the comparator
    pub fn set(&mut self, event: Event, record: PersonalBest) {
        self.records.insert(event, record);
    }
}

/// Monotonic per-event record keeper backed by `personal_best.json`
pub struct PersonalBestBook {
    doc: JsonDocument<PersonalBestState>,
}

impl PersonalBestBook {
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        Ok(Self {
            doc: JsonDocument::open(path, PersonalBestState::default)?,
        })
    }

    /// Offer a new result for an event
    ///
    /// `value` is metres for distance events, `m:ss` or seconds for STA.
    /// Returns the record now on file; `improved` tells whether it changed.
    pub fn update(
        &self,
        event: Event,
        value: &str,
        date: NaiveDate,
        location: &str,
    ) -> StorageResult<PbUpdate> {
        let candidate = parse_candidate(event, value)?;
        let location = Some(location.trim().to_string()).filter(|l| !l.is_empty());

        let outcome = self.doc.update(|state| {
            let current = state.get(event);
            if candidate <= current.score() {
                return Ok(Mutation::Discard(PbUpdate {
                    event,
                    record: current,
                    improved: false,
                }));
            }

            let record = if event.is_timed() {
                PersonalBest::time(StaticTime::from_seconds(candidate), Some(date), location)
            } else {
                PersonalBest::distance(candidate, Some(date), location)
            };
            state.set(event, record.clone());
            Ok(Mutation::Commit(PbUpdate {
                event,
                record,
                improved: true,
            }))
        })?;

        if outcome.improved {
            tracing::info!(
                "New {} personal best: {} on {}",
                event,
                outcome.record.display_value(),
                date
            );
        } else {
            tracing::debug!("{} candidate {} did not beat {}", event, value.trim(), outcome.record.display_value());
        }
        Ok(outcome)
    }

    /// Parse the event code first; unknown codes fail with `InvalidEvent`
    pub fn update_code(
        &self,
        event: &str,
        value: &str,
        date: NaiveDate,
        location: &str,
    ) -> StorageResult<PbUpdate> {
        self.update(event.parse()?, value, date, location)
    }

    pub fn get(&self, event: Event) -> StorageResult<PersonalBest> {
        Ok(self.doc.snapshot()?.get(event))
    }

    /// All four records in event order
    pub fn all(&self) -> StorageResult<Vec<(Event, PersonalBest)>> {
        let state = self.snapshot()?;
        Ok(Event::ALL.iter().map(|e| (*e, state.get(*e))).collect())
    }

    pub fn snapshot(&self) -> StorageResult<Arc<PersonalBestState>> {
        self.doc.snapshot()
    }

    /// Replace the whole document (used to seed historical bests)
    pub fn replace(&self, state: PersonalBestState) -> StorageResult<()> {
        self.doc.replace(state)
    }

    pub fn reload(&self) -> StorageResult<()> {
        self.doc.reload()
    }
}
