//! Training Log Storage
//!
//! This module provides the authoritative record layer:
//!
//! - **types**: Core data structures (Entry, DateRange)
//! - **document**: Atomic, lock-guarded JSON documents
//! - **store**: The date-keyed record store with its derived index
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Entry → validate → lock → clone → mutate → tmp file (fsync) → rename → index update
//!
//! Read Path:
//!   snapshot (Arc) → ordered iteration / point lookup
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use trainlog::storage::{Entry, RecordStore, parse_date};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RecordStore::open(std::path::Path::new("./TrainingLogs"))?;
//!
//!     let date = parse_date("2026-02-04")?;
//!     store.add(Entry::new(date, "pool", "Jing'an").duration(120.0), false)?;
//!
//!     for entry in &store.all()? {
//!         println!("{} {}", entry.date, entry.training_type);
//!     }
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use document::{read_json, write_json_atomic, JsonDocument, Mutation};
pub use error::{StorageError, StorageResult};
pub use store::{Entries, LogMetadata, RecordStore, StoreState};
pub use types::{
    parse_date, parse_timestamp, DateRange, Entry, DEFAULT_LOCATION, DEFAULT_TRAINING_TYPE,
};
