//! Content-addressed block storage for Strata.
//!
//! A block store is a pure key-value store from [`Key`] to opaque bytes,
//! where the key is the domain-separated BLAKE3 hash of the payload. A node
//! owns two independent stores: the *data* domain (file and directory
//! nodes) and the *state* domain (internal records such as the pin set).
//!
//! # Backends
//!
//! All backends implement the [`Blockstore`] trait:
//!
//! - [`InMemoryBlockstore`] -- `HashMap`-based store for tests and dry runs
//! - [`FlatFsBlockstore`] -- one file per block under sharded directories
//!
//! # Add / collect lock
//!
//! Each domain carries a [`GcLock`]. Writers that create blocks which are
//! not yet linked into a pinned tree hold the shared *add* mode for the whole
//! operation; the garbage collector takes the exclusive *collect* mode before
//! it computes the retained set. A [`BlockDomain`] bundles a store with its
//! lock.
//!
//! [`Key`]: strata_types::Key

pub mod domain;
pub mod error;
pub mod flatfs;
pub mod lock;
pub mod memory;
pub mod traits;

pub use domain::{BlockDomain, DomainKind};
pub use error::{StoreError, StoreResult};
pub use flatfs::FlatFsBlockstore;
pub use lock::{AddGuard, CollectGuard, GcLock};
pub use memory::InMemoryBlockstore;
pub use traits::Blockstore;
