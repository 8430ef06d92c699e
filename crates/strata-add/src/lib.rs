//! Ingestion pipeline for Strata.
//!
//! An [`Adder`] turns input items (files, directory trees, byte streams)
//! into DAGs on a [`Node`](strata_node::Node), pins each resulting root
//! recursively, and streams [`AddedObject`] records to a reporting stage.
//!
//! Every top-level item is processed while holding the shared add mode of
//! both block domains, so a concurrent garbage collection can never observe
//! blocks that were written but not yet pinned.

pub mod adder;
pub mod error;
pub mod input;
pub mod object;
pub mod options;
pub mod progress;

pub use adder::{AddOutcome, AddSession, AddedNode, Adder, SkipReason};
pub use error::{AddError, AddResult};
pub use input::{DirectorySource, FileSource, InputNode};
pub use object::AddedObject;
pub use options::AddOptions;
pub use progress::ProgressReader;
