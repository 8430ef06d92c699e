//! Pin set for Strata.
//!
//! A pin marks a root that must survive garbage collection:
//!
//! - [`PinMode::Recursive`] keeps the root and everything reachable from it;
//! - [`PinMode::Direct`] keeps only the root block;
//! - [`PinMode::Indirect`] is never set, it describes a key kept only
//!   because some recursive pin reaches it.
//!
//! The [`Pinner`] persists itself as a single record in the state domain
//! on [`flush`](Pinner::flush); that record is an *internal* key the
//! collector must also keep.

pub mod error;
pub mod mode;
pub mod pinner;

pub use error::{PinError, PinResult};
pub use mode::PinMode;
pub use pinner::Pinner;
