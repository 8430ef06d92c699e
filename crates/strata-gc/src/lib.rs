//! Garbage collection for Strata.
//!
//! The collector keeps every block reachable from the pin set and deletes
//! everything else, in both the data and the state domain. Each domain is
//! swept under its exclusive collect lock, so no add can be halfway through
//! writing into a domain while it is marked and swept.

pub mod collector;
pub mod error;
pub mod event;

pub use collector::GarbageCollector;
pub use error::{GcError, GcResult};
pub use event::{GcEvent, GcStats, KeyRemoved};
