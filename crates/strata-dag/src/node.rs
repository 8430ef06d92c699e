//! DAG node types.
//!
//! A [`DagNode`] is either a piece of a file or a directory. File nodes
//! carry raw bytes (leaves) or positional links to the subtrees that hold
//! the file's bytes in order (internal nodes). Directory nodes carry named
//! links, kept sorted by name so that a directory's key does not depend on
//! the order its entries were added in.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strata_crypto::ContentHasher;
use strata_types::Key;

use crate::error::{DagError, DagResult};

/// A named reference from a parent node to a child.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Entry name for directory links; empty for file links.
    pub name: String,
    /// Key of the child node.
    pub key: Key,
    /// Cumulative size of the child subtree: the child's encoded size plus
    /// the sizes recorded in all of its links.
    pub size: u64,
}

impl Link {
    pub fn new(name: impl Into<String>, key: Key, size: u64) -> Self {
        Self {
            name: name.into(),
            key,
            size,
        }
    }
}

/// Payload of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeData {
    /// File content. `blocksizes[i]` is the number of file bytes under
    /// link `i`; `filesize` covers `data` plus every link.
    File {
        data: Vec<u8>,
        filesize: u64,
        blocksizes: Vec<u64>,
    },
    /// Directory record. Entries are the node's links.
    Directory,
}

/// A node in the Merkle DAG.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagNode {
    links: Vec<Link>,
    data: NodeData,
}

/// What a parent needs to know about a persisted child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuiltNode {
    pub key: Key,
    /// Cumulative size, as recorded in a [`Link`].
    pub size: u64,
    /// File bytes under this node (zero for directories).
    pub filesize: u64,
}

impl DagNode {
    /// An empty directory.
    pub fn directory() -> Self {
        Self {
            links: Vec::new(),
            data: NodeData::Directory,
        }
    }

    /// A file leaf holding `data` inline.
    pub fn file_leaf(data: Vec<u8>) -> Self {
        let filesize = data.len() as u64;
        Self {
            links: Vec::new(),
            data: NodeData::File {
                data,
                filesize,
                blocksizes: Vec::new(),
            },
        }
    }

    /// An internal file node with no children yet.
    pub fn file() -> Self {
        Self::file_leaf(Vec::new())
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.data, NodeData::Directory)
    }

    /// Total file bytes under this node; zero for directories.
    pub fn filesize(&self) -> u64 {
        match &self.data {
            NodeData::File { filesize, .. } => *filesize,
            NodeData::Directory => 0,
        }
    }

    /// Inline file bytes; empty for internal nodes and directories.
    pub fn inline_data(&self) -> &[u8] {
        match &self.data {
            NodeData::File { data, .. } => data,
            NodeData::Directory => &[],
        }
    }

    /// Link a named child into a directory node.
    ///
    /// Links stay sorted by name. A second link with an existing name is
    /// rejected.
    pub fn add_link(&mut self, name: impl Into<String>, key: Key, size: u64) -> DagResult<()> {
        if !self.is_directory() {
            return Err(DagError::InvalidOperation(
                "named links can only be added to directories",
            ));
        }
        let name = name.into();
        match self.links.binary_search_by(|l| l.name.as_str().cmp(&name)) {
            Ok(_) => Err(DagError::DuplicateLink(name)),
            Err(pos) => {
                self.links.insert(pos, Link::new(name, key, size));
                Ok(())
            }
        }
    }

    /// Append a child subtree to a file node, after all existing children.
    pub fn add_file_child(&mut self, child: &BuiltNode) -> DagResult<()> {
        match &mut self.data {
            NodeData::File {
                filesize,
                blocksizes,
                ..
            } => {
                *filesize += child.filesize;
                blocksizes.push(child.filesize);
                self.links.push(Link::new("", child.key, child.size));
                Ok(())
            }
            NodeData::Directory => Err(DagError::InvalidOperation(
                "file children can only be added to file nodes",
            )),
        }
    }

    /// Serialize to block bytes.
    pub fn encode(&self) -> DagResult<Bytes> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(|e| DagError::Encode(e.to_string()))
    }

    /// Decode a block read under `key`.
    pub fn decode(key: &Key, bytes: &[u8]) -> DagResult<Self> {
        bincode::deserialize(bytes).map_err(|e| DagError::Malformed {
            key: *key,
            reason: e.to_string(),
        })
    }

    /// Key this node will have once stored.
    pub fn key(&self) -> DagResult<Key> {
        Ok(ContentHasher::BLOCK.hash(&self.encode()?))
    }

    /// Encoded size plus the cumulative sizes of all links.
    pub fn cumulative_size(&self) -> DagResult<u64> {
        let own = self.encode()?.len() as u64;
        Ok(own + self.links.iter().map(|l| l.size).sum::<u64>())
    }
}
