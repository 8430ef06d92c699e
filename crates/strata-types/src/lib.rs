//! Foundation types for Strata.
//!
//! Every other Strata crate depends on `strata-types`. The central type is
//! [`Key`], the content hash that identifies a block in either block domain.

pub mod error;
pub mod key;

pub use error::TypeError;
pub use key::Key;
