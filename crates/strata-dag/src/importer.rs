//! Building file trees from byte streams.
//!
//! Two layouts are supported:
//!
//! - [`Layout::Balanced`] writes every chunk as a leaf, then packs the
//!   leaves `max_links` at a time into parents, level by level, until one
//!   root remains. All leaves sit at the same depth.
//! - [`Layout::Trickle`] gives the root up to `max_links` leaves directly,
//!   then appends `layer_repeat` subtrees of depth 1, then of depth 2, and
//!   so on. A subtree of depth `d` holds direct leaves followed by
//!   `layer_repeat` subtrees of every depth below `d`. The start of a file
//!   is reachable in few hops and appending only touches the right edge.
//!
//! Both layouts persist nodes strictly bottom-up: a parent is encoded only
//! after every child has been stored.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::debug;

use crate::chunker::{Splitter, DEFAULT_CHUNK_SIZE};
use crate::error::DagResult;
use crate::node::{BuiltNode, DagNode};
use crate::service::DagService;

/// Default fan-out of an internal file node.
pub const DEFAULT_MAX_LINKS: usize = 174;

/// Default number of same-depth subtrees in a trickle layer.
pub const DEFAULT_LAYER_REPEAT: usize = 4;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shape of the tree built for a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Balanced,
    Trickle,
}

/// Tunables for tree construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderParams {
    pub chunk_size: usize,
    pub max_links: usize,
    pub layer_repeat: usize,
}

impl Default for BuilderParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_links: DEFAULT_MAX_LINKS,
            layer_repeat: DEFAULT_LAYER_REPEAT,
        }
    }
}

impl BuilderParams {
    fn max_links(&self) -> usize {
        self.max_links.max(2)
    }

    fn layer_repeat(&self) -> usize {
        self.layer_repeat.max(1)
    }
}

impl DagService {
    /// Chunk `reader`, persist the resulting tree, and return its root.
    pub async fn build_from_reader<R>(
        &self,
        reader: R,
        layout: Layout,
        params: &BuilderParams,
    ) -> DagResult<BuiltNode>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut splitter = Splitter::new(reader, params.chunk_size);
        let root = match layout {
            Layout::Balanced => self.build_balanced(&mut splitter, params).await?,
            Layout::Trickle => self.build_trickle(&mut splitter, params).await?,
        };
        debug!(
            key = %root.key.short_hex(),
            ?layout,
            filesize = root.filesize,
            "built file DAG"
        );
        Ok(root)
    }

    async fn add_leaf(&self, chunk: Vec<u8>) -> DagResult<BuiltNode> {
        self.add_built(&DagNode::file_leaf(chunk)).await
    }

    async fn build_balanced<R>(
        &self,
        splitter: &mut Splitter<R>,
        params: &BuilderParams,
    ) -> DagResult<BuiltNode>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut level = Vec::new();
        while let Some(chunk) = splitter.next_chunk().await? {
            level.push(self.add_leaf(chunk).await?);
        }
        if level.is_empty() {
            return self.add_leaf(Vec::new()).await;
        }

        let max_links = params.max_links();
        while level.len() > 1 {
            let mut parents = Vec::with_capacity(level.len().div_ceil(max_links));
            for group in level.chunks(max_links) {
                let mut parent = DagNode::file();
                for child in group {
                    parent.add_file_child(child)?;
                }
                parents.push(self.add_built(&parent).await?);
            }
            level = parents;
        }
        Ok(level[0])
    }

    async fn build_trickle<R>(
        &self,
        splitter: &mut Splitter<R>,
        params: &BuilderParams,
    ) -> DagResult<BuiltNode>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut root = DagNode::file();
        self.fill_leaves(splitter, &mut root, params.max_links()).await?;

        let mut depth = 1;
        'layers: while !splitter.is_done() {
            for _ in 0..params.layer_repeat() {
                match self.trickle_subtree(splitter, depth, params).await? {
                    Some(child) => root.add_file_child(&child)?,
                    None => break 'layers,
                }
            }
            depth += 1;
        }
        self.add_built(&root).await
    }

    /// Build one trickle subtree of the given depth, or `None` if the
    /// stream had nothing left.
    fn trickle_subtree<'a, R>(
        &'a self,
        splitter: &'a mut Splitter<R>,
        depth: usize,
        params: &'a BuilderParams,
    ) -> BoxFuture<'a, DagResult<Option<BuiltNode>>>
    where
        R: AsyncRead + Unpin + Send,
    {
        Box::pin(async move {
            let mut node = DagNode::file();
            self.fill_leaves(splitter, &mut node, params.max_links()).await?;
            if node.links().is_empty() {
                return Ok(None);
            }
            'layers: for sub_depth in 1..depth {
                for _ in 0..params.layer_repeat() {
                    match self.trickle_subtree(splitter, sub_depth, params).await? {
                        Some(child) => node.add_file_child(&child)?,
                        None => break 'layers,
                    }
                }
            }
            Ok(Some(self.add_built(&node).await?))
        })
    }

    async fn fill_leaves<R>(
        &self,
        splitter: &mut Splitter<R>,
        node: &mut DagNode,
        max_links: usize,
    ) -> DagResult<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        while node.links().len() < max_links {
            match splitter.next_chunk().await? {
                Some(chunk) => {
                    let leaf = self.add_leaf(chunk).await?;
                    node.add_file_child(&leaf)?;
                }
                None => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use proptest::prelude::*;
    use strata_store::InMemoryBlockstore;

    fn service() -> DagService {
        DagService::new(Arc::new(InMemoryBlockstore::new()))
    }

    fn small_params() -> BuilderParams {
        BuilderParams {
            chunk_size: 4,
            max_links: 3,
            layer_repeat: 2,
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn depth_of(dag: &DagService, key: &strata_types::Key) -> usize {
        let node = dag.get(key).await.unwrap();
        let mut deepest = 0;
        for link in node.links() {
            deepest = deepest.max(Box::pin(depth_of(dag, &link.key)).await);
        }
        deepest + usize::from(!node.links().is_empty())
    }

    #[tokio::test]
    async fn single_chunk_balanced_root_is_leaf() {
        let dag = service();
        let root = dag
            .build_from_reader(&b"abc"[..], Layout::Balanced, &small_params())
            .await
            .unwrap();
        let node = dag.get(&root.key).await.unwrap();
        assert!(node.links().is_empty());
        assert_eq!(node.inline_data(), b"abc");
        assert_eq!(root.filesize, 3);
    }

    #[tokio::test]
    async fn balanced_packs_max_links_per_parent() {
        let dag = service();
        // 10 chunks of 4 bytes with fan-out 3 -> 4 parents -> 2 -> 1.
        let data = pattern(40);
        let root = dag
            .build_from_reader(&data[..], Layout::Balanced, &small_params())
            .await
            .unwrap();
        let node = dag.get(&root.key).await.unwrap();
        assert_eq!(node.links().len(), 2);
        assert_eq!(node.filesize(), 40);
        assert_eq!(depth_of(&dag, &root.key).await, 3);
    }

    #[tokio::test]
    async fn trickle_root_holds_direct_leaves_first() {
        let dag = service();
        let data = pattern(40);
        let root = dag
            .build_from_reader(&data[..], Layout::Trickle, &small_params())
            .await
            .unwrap();
        let node = dag.get(&root.key).await.unwrap();
        for link in &node.links()[..3] {
            let child = dag.get(&link.key).await.unwrap();
            assert!(child.links().is_empty(), "first links are leaves");
            assert_eq!(child.filesize(), 4);
        }
        assert!(node.links().len() > 3);
        assert_eq!(node.filesize(), 40);
    }

    #[tokio::test]
    async fn layouts_produce_different_roots() {
        let dag = service();
        let data = pattern(100);
        let balanced = dag
            .build_from_reader(&data[..], Layout::Balanced, &small_params())
            .await
            .unwrap();
        let trickle = dag
            .build_from_reader(&data[..], Layout::Trickle, &small_params())
            .await
            .unwrap();
        assert_ne!(balanced.key, trickle.key);
        assert_eq!(balanced.filesize, trickle.filesize);
    }

    #[tokio::test]
    async fn empty_stream_builds_empty_file() {
        let dag = service();
        for layout in [Layout::Balanced, Layout::Trickle] {
            let root = dag
                .build_from_reader(&b""[..], layout, &small_params())
                .await
                .unwrap();
            assert_eq!(root.filesize, 0);
            assert!(dag.cat(&root.key).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn building_is_deterministic() {
        let data = pattern(77);
        let a = service()
            .build_from_reader(&data[..], Layout::Trickle, &small_params())
            .await
            .unwrap();
        let b = service()
            .build_from_reader(&data[..], Layout::Trickle, &small_params())
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn default_params() {
        let params = BuilderParams::default();
        assert_eq!(params.chunk_size, 256 * 1024);
        assert_eq!(params.max_links, 174);
        assert_eq!(params.layer_repeat, 4);
        assert_eq!(Layout::default(), Layout::Balanced);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn roundtrip_reassembles_original_stream(
            data in proptest::collection::vec(any::<u8>(), 0..600),
            chunk_size in 1usize..16,
            max_links in 2usize..6,
            trickle in any::<bool>(),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let layout = if trickle { Layout::Trickle } else { Layout::Balanced };
            let params = BuilderParams { chunk_size, max_links, layer_repeat: 2 };
            let (root, out) = rt.block_on(async {
                let dag = service();
                let root = dag.build_from_reader(&data[..], layout, &params).await.unwrap();
                let out = dag.cat(&root.key).await.unwrap();
                (root, out)
            });
            prop_assert_eq!(root.filesize, data.len() as u64);
            prop_assert_eq!(out, data);
        }
    }
}
