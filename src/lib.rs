//! # trainlog
//!
//! Record indexing and retrieval for a personal freediving / training log.
//!
//! ## Features
//!
//! - **Date-keyed store**: one entry per day, atomic JSON persistence
//! - **Derived indices**: by type and location, verified and self-healing
//! - **Filtered queries**: AND-combined filters with explicit ordering
//! - **Ingestion**: CSV sheets, markdown notes and generated daily reports
//! - **Records**: monotonic personal bests and lung-capacity history
//! - **Statistics**: windowed histograms and trend classification
//!
//! ## Modules
//!
//! - [`storage`]: Entries, JSON documents and the record store
//! - [`index`]: Label indices and the index manager
//! - [`query`]: Search filters and the query engine
//! - [`integrations`]: Ingestion adapters
//! - [`records`]: Personal bests and lung capacity
//! - [`stats`]: Aggregation and trends
//! - [`logbook`]: One handle over all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trainlog::{Config, Logbook, SearchFilter, SortOrder};
//! use trainlog::storage::{parse_date, Entry};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let book = Logbook::open(Config::load_default())?;
//!
//!     let date = parse_date("2026-02-04")?;
//!     book.add(Entry::new(date, "pool", "Jing'an").duration(120.0), false)?;
//!
//!     let pool_days = book.search(
//!         &SearchFilter::new().training_type("pool"),
//!         SortOrder::Descending,
//!     )?;
//!     println!("{} pool sessions", pool_days.len());
//!
//!     let pb = book.update_personal_best("STA", "9:10", date, "Jing'an")?;
//!     println!("STA best: {}", pb.record.display_value());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod index;
pub mod integrations;
pub mod logbook;
pub mod query;
pub mod records;
pub mod stats;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{DateRange, Entry, RecordStore, StorageError, StorageResult};

pub use index::{IndexManager, IndexStats, LogIndex};

pub use query::{QueryEngine, SearchFilter, SortOrder};

pub use integrations::{BatchReport, SkipReason, SkippedItem};

pub use records::{Event, LungCapacityLog, PersonalBest, PersonalBestBook, StaticTime};

pub use stats::{Aggregator, Summary, Trend};

pub use config::{Config, ConfigError, IngestConfig, LoggingConfig, StorageConfig};

pub use logbook::Logbook;
