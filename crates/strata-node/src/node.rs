use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use fs4::FileExt;
use strata_dag::DagService;
use strata_pin::Pinner;
use strata_store::{BlockDomain, Blockstore, DomainKind, FlatFsBlockstore, InMemoryBlockstore};
use tracing::info;

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};

/// A local content-addressed node.
///
/// Owns the data domain (file and directory nodes), the state domain
/// (flushed pin records), the DAG service over the data domain, and the pin
/// set.
///
/// An on-disk node holds an exclusive advisory lock on its repository for
/// as long as it is alive, so a second handle (in this process or another)
/// cannot open the same repository concurrently.
pub struct Node {
    config: NodeConfig,
    data: BlockDomain,
    state: BlockDomain,
    dag: DagService,
    pinner: Arc<Pinner>,
    persistent: bool,
    _repo_lock: Option<File>,
}

impl Node {
    /// Create the repository layout at `config.repo_path` and open it.
    /// If the repository already has a config file, that file wins.
    pub async fn init(config: NodeConfig) -> NodeResult<Self> {
        let path = config.config_path();
        if path.exists() {
            return Self::open(NodeConfig::load(&path)?).await;
        }
        std::fs::create_dir_all(&config.repo_path)?;
        config.save(&path)?;
        info!(repo = %config.repo_path.display(), "initialized repository");
        Self::open(config).await
    }

    /// Open the repository at `repo`, reading its config file.
    pub async fn open_repo(repo: impl AsRef<Path>) -> NodeResult<Self> {
        let config = NodeConfig::load(repo.as_ref().join(crate::config::CONFIG_FILE))?;
        Self::open(config).await
    }

    /// Open flat-file domains under `config.repo_path` and restore the pin
    /// set from its pointer file.
    pub async fn open(config: NodeConfig) -> NodeResult<Self> {
        if !config.repo_path.is_dir() {
            return Err(NodeError::NotInitialized(config.repo_path.clone()));
        }
        let repo_lock = lock_repo(&config.lock_path())?;
        let data: Arc<dyn Blockstore> = Arc::new(FlatFsBlockstore::open(config.blocks_path())?);
        let state: Arc<dyn Blockstore> = Arc::new(FlatFsBlockstore::open(config.state_path())?);
        let dag = DagService::new(data.clone());
        let pinner = Pinner::load(dag.clone(), state.clone(), config.pins_path()).await?;
        info!(repo = %config.repo_path.display(), "opened node");
        Ok(Self {
            config,
            data: BlockDomain::new(DomainKind::Data, data),
            state: BlockDomain::new(DomainKind::State, state),
            dag,
            pinner: Arc::new(pinner),
            persistent: true,
            _repo_lock: Some(repo_lock),
        })
    }

    /// A node backed by in-memory stores. Nothing survives the process.
    pub fn in_memory(config: NodeConfig) -> Self {
        let data: Arc<dyn Blockstore> = Arc::new(InMemoryBlockstore::new());
        let state: Arc<dyn Blockstore> = Arc::new(InMemoryBlockstore::new());
        Self::with_stores(config, data, state)
    }

    /// Assemble a node from arbitrary stores, without a pin pointer file.
    pub fn with_stores(
        config: NodeConfig,
        data: Arc<dyn Blockstore>,
        state: Arc<dyn Blockstore>,
    ) -> Self {
        let dag = DagService::new(data.clone());
        let pinner = Pinner::new(dag.clone(), state.clone(), None);
        Self {
            config,
            data: BlockDomain::new(DomainKind::Data, data),
            state: BlockDomain::new(DomainKind::State, state),
            dag,
            pinner: Arc::new(pinner),
            persistent: false,
            _repo_lock: None,
        }
    }

    /// A fresh in-memory node with this node's config, used for hash-only
    /// adds so that nothing reaches the real stores or pin set.
    pub fn ephemeral(&self) -> Self {
        Self::in_memory(self.config.clone())
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn data(&self) -> &BlockDomain {
        &self.data
    }

    pub fn state(&self) -> &BlockDomain {
        &self.state
    }

    /// Both domains, in collection order.
    pub fn domains(&self) -> [&BlockDomain; 2] {
        [&self.data, &self.state]
    }

    pub fn dag(&self) -> &DagService {
        &self.dag
    }

    pub fn pinner(&self) -> &Arc<Pinner> {
        &self.pinner
    }

    /// `true` when backed by an on-disk repository.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

/// Take the repository lock without waiting.
fn lock_repo(path: &Path) -> NodeResult<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == ErrorKind::WouldBlock => {
            Err(NodeError::Locked(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("repo", &self.config.repo_path)
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use strata_dag::DagNode;
    use strata_pin::PinMode;

    #[tokio::test]
    async fn in_memory_node_has_separate_domains() {
        let node = Node::in_memory(NodeConfig::default());
        let key = node.data().store().put(Bytes::from_static(b"block")).await.unwrap();
        assert!(!node.state().store().has(&key).await.unwrap());
        assert_eq!(node.data().kind(), DomainKind::Data);
        assert_eq!(node.state().kind(), DomainKind::State);
        assert!(!node.is_persistent());
    }

    #[tokio::test]
    async fn ephemeral_node_shares_nothing() {
        let node = Node::in_memory(NodeConfig::default());
        let scratch = node.ephemeral();
        let key = scratch.dag().add(&DagNode::file_leaf(b"x".to_vec())).await.unwrap();
        assert!(!node.data().store().has(&key).await.unwrap());
        assert_eq!(scratch.config(), node.config());
    }

    #[tokio::test]
    async fn open_without_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Node::open_repo(dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, NodeError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn pins_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::with_repo(dir.path().join("repo"));

        let key = {
            let node = Node::init(config.clone()).await.unwrap();
            assert!(node.is_persistent());
            let key = node.dag().add(&DagNode::file_leaf(b"kept".to_vec())).await.unwrap();
            node.pinner().pin(key, PinMode::Recursive).await.unwrap();
            node.pinner().flush().await.unwrap();
            key
        };

        let node = Node::open_repo(&config.repo_path).await.unwrap();
        assert_eq!(node.pinner().recursive_keys(), vec![key]);
        assert_eq!(node.dag().cat(&key).await.unwrap(), b"kept");
    }

    #[tokio::test]
    async fn second_handle_cannot_open_locked_repo() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::with_repo(dir.path().join("repo"));
        let first = Node::init(config.clone()).await.unwrap();

        let err = Node::open_repo(&config.repo_path).await.unwrap_err();
        assert!(matches!(err, NodeError::Locked(_)));

        drop(first);
        let again = Node::open_repo(&config.repo_path).await.unwrap();
        assert!(again.is_persistent());
    }

    #[tokio::test]
    async fn locked_repo_keeps_other_handles_pins_safe() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::with_repo(dir.path().join("repo"));
        let key = {
            let writer = Node::init(config.clone()).await.unwrap();
            let key = writer.dag().add(&DagNode::file_leaf(b"fresh".to_vec())).await.unwrap();
            writer.pinner().pin(key, PinMode::Recursive).await.unwrap();
            writer.pinner().flush().await.unwrap();
            assert!(Node::open_repo(&config.repo_path).await.is_err());
            key
        };

        // A handle opened after the writer is gone sees the writer's pins.
        let node = Node::open_repo(&config.repo_path).await.unwrap();
        assert_eq!(node.pinner().recursive_keys(), vec![key]);
    }

    #[tokio::test]
    async fn init_keeps_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::with_repo(dir.path());
        config.chunk_size = 512;
        Node::init(config.clone()).await.unwrap();

        let again = Node::init(NodeConfig::with_repo(dir.path())).await.unwrap();
        assert_eq!(again.config().chunk_size, 512);
    }
}
