//! Personal records
//!
//! - **personal_best**: Monotonic per-event bests (DNF, DYN, DYNB, STA)
//! - **lung_capacity**: Dated lung-capacity measurements with a running best
//!
//! Each is its own JSON document with its own lock, independent of the
//! training log.

mod lung_capacity;
mod personal_best;

pub use lung_capacity::{
    parse_measurements, LungCapacityLog, LungCapacityRecord, LungCapacityState, LungInput,
    LUNG_CAPACITY_FILE,
};
pub use personal_best::{
    Event, PbUpdate, PersonalBest, PersonalBestBook, PersonalBestState, StaticTime,
    PERSONAL_BEST_FILE,
};
