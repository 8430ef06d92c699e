//! Merkle DAG for Strata.
//!
//! Files are split into chunks by a [`Splitter`], each chunk becomes a leaf
//! [`DagNode`], and leaves are linked into a tree whose shape is chosen by a
//! [`Layout`]. Directories are nodes whose links name their entries. Every
//! node is persisted as one block; its key is the hash of its encoding, so a
//! parent can only be built once all of its children have keys.
//!
//! [`DagService`] wraps a [`Blockstore`](strata_store::Blockstore) and is the
//! only way the rest of the system reads or writes nodes.

pub mod chunker;
pub mod error;
pub mod importer;
pub mod node;
pub mod reader;
pub mod service;

pub use chunker::{Splitter, DEFAULT_CHUNK_SIZE};
pub use error::{DagError, DagResult};
pub use importer::{BuilderParams, Layout};
pub use node::{BuiltNode, DagNode, Link, NodeData};
pub use reader::DagReader;
pub use service::DagService;
