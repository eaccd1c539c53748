//! Training Log Query Engine
//!
//! Filtered, ordered retrieval over the log index:
//!
//! - **Filter**: Optional, AND-combined search criteria
//! - **Executor**: Execute filters against an index snapshot
//!
//! # Examples
//!
//! ```rust,no_run
//! use trainlog::query::{QueryEngine, SearchFilter, SortOrder};
//! use trainlog::storage::{DateRange, RecordStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RecordStore::open(std::path::Path::new("./TrainingLogs"))?;
//!     let engine = QueryEngine::for_store(&store)?;
//!
//!     let filter = SearchFilter::new()
//!         .date_range(DateRange::parse("2026-02-01", "2026-02-07")?)
//!         .training_type("pool");
//!
//!     for entry in engine.search(&filter, SortOrder::Ascending) {
//!         println!("{} {}", entry.date, entry.location);
//!     }
//!     Ok(())
//! }
//! ```

mod executor;
mod filter;

pub use executor::QueryEngine;
pub use filter::{contains_ignore_case, SearchFilter, SortOrder};
