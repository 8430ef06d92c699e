//! Persistence and traversal of DAG nodes over a block store.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use strata_store::Blockstore;
use strata_types::Key;
use tracing::debug;

use crate::error::{DagError, DagResult};
use crate::node::{BuiltNode, DagNode, Link};

/// Reads and writes [`DagNode`]s through a [`Blockstore`].
#[derive(Clone)]
pub struct DagService {
    store: Arc<dyn Blockstore>,
}

impl DagService {
    pub fn new(store: Arc<dyn Blockstore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Blockstore> {
        &self.store
    }

    /// Persist a node and return its key.
    pub async fn add(&self, node: &DagNode) -> DagResult<Key> {
        Ok(self.add_built(node).await?.key)
    }

    /// Persist a node and return everything a parent needs to link it.
    pub async fn add_built(&self, node: &DagNode) -> DagResult<BuiltNode> {
        let bytes = node.encode()?;
        let size = bytes.len() as u64 + node.links().iter().map(|l| l.size).sum::<u64>();
        let key = self.store.put(bytes).await?;
        debug!(key = %key.short_hex(), links = node.links().len(), "stored DAG node");
        Ok(BuiltNode {
            key,
            size,
            filesize: node.filesize(),
        })
    }

    /// Fetch and decode a node. Absence is [`StoreError::NotFound`].
    ///
    /// [`StoreError::NotFound`]: strata_store::StoreError::NotFound
    pub async fn get(&self, key: &Key) -> DagResult<DagNode> {
        let bytes = self.store.get_required(key).await?;
        DagNode::decode(key, &bytes)
    }

    pub async fn has(&self, key: &Key) -> DagResult<bool> {
        Ok(self.store.has(key).await?)
    }

    /// Entries of a directory node.
    pub async fn list(&self, key: &Key) -> DagResult<Vec<Link>> {
        let node = self.get(key).await?;
        if !node.is_directory() {
            return Err(DagError::NotADirectory(*key));
        }
        Ok(node.links().to_vec())
    }

    /// Every key reachable from `root`, including `root` itself (BFS).
    ///
    /// A key shared by several parents is fetched once. A missing node
    /// aborts the walk: a partial closure would understate what must be
    /// kept.
    pub async fn descendants(&self, root: &Key) -> DagResult<HashSet<Key>> {
        let mut visited = HashSet::new();
        self.walk_into(root, &mut visited).await?;
        Ok(visited)
    }

    /// Add the closure of `root` to `visited`, skipping keys already in it.
    pub async fn walk_into(&self, root: &Key, visited: &mut HashSet<Key>) -> DagResult<()> {
        let mut queue = VecDeque::new();
        if visited.insert(*root) {
            queue.push_back(*root);
        }
        while let Some(key) = queue.pop_front() {
            let node = self.get(&key).await?;
            for link in node.links() {
                if visited.insert(link.key) {
                    queue.push_back(link.key);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DagService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DagService").finish_non_exhaustive()
    }
}
