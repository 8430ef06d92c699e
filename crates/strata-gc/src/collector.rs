use std::sync::Arc;

use strata_node::Node;
use strata_pin::Pinner;
use strata_store::BlockDomain;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{GcError, GcResult};
use crate::event::{GcEvent, GcStats, KeyRemoved};

type SweepResult = GcResult<KeyRemoved>;

/// Mark-and-sweep collector over a node's two block domains.
#[derive(Clone)]
pub struct GarbageCollector {
    node: Arc<Node>,
}

impl GarbageCollector {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    /// Collect both domains and wait for the result.
    ///
    /// Returns as soon as `cancel` fires, with [`GcError::Cancelled`].
    /// Otherwise waits until both domains are done; if either failed, the
    /// first failure is returned.
    pub async fn collect(&self, cancel: &CancellationToken) -> GcResult<GcStats> {
        let mut events = self.collect_async(cancel.clone());
        let mut stats = GcStats::default();
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GcError::Cancelled),
                event = events.recv() => event,
            };
            match event {
                Some(GcEvent::Removed(removed)) => stats.record(&removed),
                Some(GcEvent::Error(e)) => return Err(e),
                None => break,
            }
        }
        if cancel.is_cancelled() {
            return Err(GcError::Cancelled);
        }
        info!(
            data = stats.data_removed,
            state = stats.state_removed,
            "garbage collection finished"
        );
        Ok(stats)
    }

    /// Collect both domains in the background, streaming removed keys.
    ///
    /// The domains are swept concurrently and their removals arrive in any
    /// interleaving. If a domain fails, the other still runs to completion
    /// and the first failure is delivered as a final [`GcEvent::Error`].
    /// The stream closes when both sweeps are done, after an error, or
    /// shortly after `cancel` fires. Dropping the receiver stops the sweeps.
    pub fn collect_async(&self, cancel: CancellationToken) -> mpsc::Receiver<GcEvent> {
        let capacity = self.node.config().output_capacity.max(1);
        let (out, events) = mpsc::channel(capacity);
        let (tx, merged) = mpsc::channel(capacity);
        for domain in self.node.domains() {
            tokio::spawn(sweep(
                domain.clone(),
                self.node.pinner().clone(),
                cancel.clone(),
                tx.clone(),
            ));
        }
        drop(tx);
        tokio::spawn(forward(merged, out, cancel));
        events
    }
}

impl std::fmt::Debug for GarbageCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarbageCollector")
            .field("node", &self.node)
            .finish()
    }
}

/// Relay sweep results to the caller. Removals pass straight through; the
/// first sweep error is held back until every sweep has finished.
async fn forward(
    mut merged: mpsc::Receiver<SweepResult>,
    out: mpsc::Sender<GcEvent>,
    cancel: CancellationToken,
) {
    let mut first_error = None;
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = out.try_send(GcEvent::Error(GcError::Cancelled));
                return;
            }
            item = merged.recv() => item,
        };
        match item {
            Some(Ok(removed)) => {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        let _ = out.try_send(GcEvent::Error(GcError::Cancelled));
                        return;
                    }
                    sent = out.send(GcEvent::Removed(removed)) => sent,
                };
                if sent.is_err() {
                    debug!("gc consumer went away");
                    return;
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "domain collection failed");
                first_error.get_or_insert(e);
            }
            None => break,
        }
    }
    if let Some(e) = first_error {
        let _ = out.send(GcEvent::Error(e)).await;
    }
}

async fn sweep(
    domain: BlockDomain,
    pinner: Arc<Pinner>,
    cancel: CancellationToken,
    tx: mpsc::Sender<SweepResult>,
) {
    if let Err(e) = sweep_domain(&domain, &pinner, &cancel, &tx).await {
        let _ = tx.send(Err(e)).await;
    }
}

/// Mark and sweep one domain while holding its collect lock.
async fn sweep_domain(
    domain: &BlockDomain,
    pinner: &Pinner,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<SweepResult>,
) -> GcResult<()> {
    let kind = domain.kind();
    let _guard = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(GcError::Cancelled),
        guard = domain.collect_lock() => guard,
    };

    let retained = pinner.retained_keys().await?;
    let keys = domain.store().all_keys().await?;
    debug!(
        domain = %kind,
        retained = retained.len(),
        stored = keys.len(),
        "marked"
    );

    let mut removed = 0usize;
    for key in keys {
        if retained.contains(&key) {
            continue;
        }
        if cancel.is_cancelled() {
            return Err(GcError::Cancelled);
        }
        // A delete that has started is allowed to finish.
        domain.store().delete(&key).await?;
        removed += 1;
        let event = KeyRemoved { key, domain: kind };
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GcError::Cancelled),
            sent = tx.send(Ok(event)) => sent,
        };
        if sent.is_err() {
            return Ok(());
        }
    }
    info!(domain = %kind, removed, "swept");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use strata_add::{AddOptions, Adder, InputNode};
    use strata_dag::DagNode;
    use strata_node::NodeConfig;
    use strata_pin::PinMode;
    use strata_store::{Blockstore, DomainKind, InMemoryBlockstore, StoreError, StoreResult};
    use strata_types::Key;
    use tokio::io::AsyncWriteExt;

    fn node() -> Arc<Node> {
        Arc::new(Node::in_memory(NodeConfig::default()))
    }

    async fn add_file(node: &Arc<Node>, name: &str, data: &'static [u8]) -> Key {
        let adder = Adder::new(node.clone(), AddOptions::default()).unwrap();
        let (_, result) = adder.spawn(vec![InputNode::file(name, data)]).finish().await;
        result.unwrap()[0]
    }

    async fn put_stray(node: &Node, data: &'static [u8]) -> Key {
        node.data().store().put(Bytes::from_static(data)).await.unwrap()
    }

    /// Fails enumeration; everything else goes to an in-memory store.
    struct UnlistableStore(InMemoryBlockstore);

    #[async_trait]
    impl Blockstore for UnlistableStore {
        async fn put(&self, data: Bytes) -> StoreResult<Key> {
            self.0.put(data).await
        }
        async fn get(&self, key: &Key) -> StoreResult<Option<Bytes>> {
            self.0.get(key).await
        }
        async fn has(&self, key: &Key) -> StoreResult<bool> {
            self.0.has(key).await
        }
        async fn delete(&self, key: &Key) -> StoreResult<bool> {
            self.0.delete(key).await
        }
        async fn all_keys(&self) -> StoreResult<Vec<Key>> {
            Err(StoreError::Io(std::io::Error::other("listing failed")))
        }
    }

    #[tokio::test]
    async fn pinned_tree_survives_and_garbage_goes() {
        let node = node();
        let root = add_file(&node, "keep", b"pinned content").await;
        let stray = put_stray(&node, b"unreferenced").await;

        let stats = GarbageCollector::new(node.clone())
            .collect(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.data_removed, 1);
        assert!(!node.data().store().has(&stray).await.unwrap());
        assert_eq!(node.dag().cat(&root).await.unwrap(), b"pinned content");
    }

    #[tokio::test]
    async fn unpinned_tree_is_fully_removed() {
        let node = node();
        let root = add_file(&node, "temp", b"short lived").await;
        node.pinner().unpin(&root, true).unwrap();
        node.pinner().flush().await.unwrap();

        GarbageCollector::new(node.clone())
            .collect(&CancellationToken::new())
            .await
            .unwrap();
        assert!(node.data().store().all_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn direct_pin_keeps_only_the_root() {
        let node = node();
        let leaf = node.dag().add_built(&DagNode::file_leaf(b"leaf".to_vec())).await.unwrap();
        let mut parent = DagNode::file();
        parent.add_file_child(&leaf).unwrap();
        let root = node.dag().add(&parent).await.unwrap();
        node.pinner().pin(root, PinMode::Direct).await.unwrap();

        let stats = GarbageCollector::new(node.clone())
            .collect(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.data_removed, 1);
        assert!(node.data().store().has(&root).await.unwrap());
        assert!(!node.data().store().has(&leaf.key).await.unwrap());
    }

    #[tokio::test]
    async fn stale_pin_records_are_swept_from_state() {
        let node = node();
        add_file(&node, "a", b"first").await;
        add_file(&node, "b", b"second").await;
        assert_eq!(node.state().store().all_keys().await.unwrap().len(), 2);

        let stats = GarbageCollector::new(node.clone())
            .collect(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.state_removed, 1);
        assert_eq!(
            node.state().store().all_keys().await.unwrap(),
            node.pinner().internal_keys()
        );
        assert_eq!(stats.data_removed, 0);
    }

    #[tokio::test]
    async fn async_stream_reports_each_removal() {
        let node = node();
        let strays = [
            put_stray(&node, b"one").await,
            put_stray(&node, b"two").await,
            put_stray(&node, b"three").await,
        ];

        let mut events = GarbageCollector::new(node.clone()).collect_async(CancellationToken::new());
        let mut removed = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                GcEvent::Removed(r) => removed.push(r),
                GcEvent::Error(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(removed.len(), 3);
        assert!(removed.iter().all(|r| r.domain == DomainKind::Data));
        for key in strays {
            assert!(removed.iter().any(|r| r.key == key));
        }
    }

    #[tokio::test]
    async fn cancelled_before_start_deletes_nothing() {
        let node = node();
        let stray = put_stray(&node, b"spared").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = GarbageCollector::new(node.clone()).collect(&cancel).await;
        assert!(matches!(result, Err(GcError::Cancelled)));
        // Give the background sweeps a chance to run; they must not delete.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(node.data().store().has(&stray).await.unwrap());
    }

    #[tokio::test]
    async fn cancellation_mid_sweep_stops_deleting_and_closes_stream() {
        let config = NodeConfig {
            output_capacity: 1,
            ..NodeConfig::default()
        };
        let node = Arc::new(Node::in_memory(config));
        for i in 0..50u32 {
            node.data().store().put(Bytes::from(i.to_be_bytes().to_vec())).await.unwrap();
        }

        let cancel = CancellationToken::new();
        let mut events = GarbageCollector::new(node.clone()).collect_async(cancel.clone());
        assert!(matches!(events.recv().await, Some(GcEvent::Removed(_))));
        cancel.cancel();

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            let mut n = 0;
            while events.recv().await.is_some() {
                n += 1;
            }
            n
        })
        .await
        .expect("stream closes after cancellation");
        assert!(drained < 10);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!node.data().store().all_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collection_waits_for_in_flight_add() {
        let node = node();
        let (mut writer, reader) = tokio::io::duplex(64);
        let adder = Adder::new(node.clone(), AddOptions::default()).unwrap();
        let session = adder.spawn(vec![InputNode::reader("stream", reader)]);

        tokio::time::timeout(Duration::from_secs(5), async {
            while node.data().lock().try_collect_lock().is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let gc = GarbageCollector::new(node.clone());
        let collection = tokio::spawn(async move { gc.collect(&CancellationToken::new()).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!collection.is_finished());

        writer.write_all(b"written while gc waits").await.unwrap();
        drop(writer);
        let (_, result) = session.finish().await;
        let root = result.unwrap()[0];

        let stats = collection.await.unwrap().unwrap();
        assert_eq!(stats.data_removed, 0);
        assert_eq!(node.dag().cat(&root).await.unwrap(), b"written while gc waits");
    }

    #[tokio::test]
    async fn direct_pin_inside_recursive_tree_keeps_the_subtree() {
        let node = node();
        let options = AddOptions {
            recursive: true,
            ..AddOptions::default()
        };
        let tree = InputNode::directory(
            "top",
            vec![InputNode::directory("sub", vec![InputNode::file("f.txt", &b"nested"[..])])],
        );
        let (_, result) = Adder::new(node.clone(), options).unwrap().spawn(vec![tree]).finish().await;
        let top = result.unwrap()[0];
        let sub = node.dag().list(&top).await.unwrap()[0].key;
        let file = node.dag().list(&sub).await.unwrap()[0].key;
        node.pinner().pin(sub, PinMode::Direct).await.unwrap();

        let stats = GarbageCollector::new(node.clone())
            .collect(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.data_removed, 0);
        assert_eq!(node.dag().cat(&file).await.unwrap(), b"nested");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_and_collection_keep_every_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::with_repo(dir.path().join("repo"));
        let node = Arc::new(Node::init(config.clone()).await.unwrap());
        let stray = put_stray(&node, b"garbage").await;

        let mut sessions = Vec::new();
        let mut writers = Vec::new();
        let mut contents = Vec::new();
        for i in 0..6u8 {
            let adder = Adder::new(node.clone(), AddOptions::default()).unwrap();
            let content = format!("content of input {i}").into_bytes();
            if i % 2 == 0 {
                let (writer, reader) = tokio::io::duplex(8);
                sessions.push(adder.spawn(vec![InputNode::reader(format!("slow-{i}"), reader)]));
                writers.push((writer, content.clone()));
            } else {
                let input = InputNode::file(format!("fast-{i}"), content.clone());
                sessions.push(adder.spawn(vec![input]));
            }
            contents.push(content);
        }

        let gc = GarbageCollector::new(node.clone());
        let collection = tokio::spawn(async move { gc.collect(&CancellationToken::new()).await });
        let feeders: Vec<_> = writers
            .into_iter()
            .map(|(mut writer, content)| {
                tokio::spawn(async move {
                    for chunk in content.chunks(4) {
                        writer.write_all(chunk).await.unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let mut roots = Vec::new();
        for session in sessions {
            let (_, result) = session.finish().await;
            roots.push(result.unwrap()[0]);
        }
        for feeder in feeders {
            feeder.await.unwrap();
        }
        let stats = collection.await.unwrap().unwrap();
        assert_eq!(stats.data_removed, 1);
        assert!(!node.data().store().has(&stray).await.unwrap());

        for (root, content) in roots.iter().zip(&contents) {
            assert_eq!(
                node.pinner().pinned_mode(root).await.unwrap(),
                Some(PinMode::Recursive)
            );
            assert_eq!(&node.dag().cat(root).await.unwrap(), content);
        }

        drop(node);
        let reopened = Node::open_repo(&config.repo_path).await.unwrap();
        let mut pinned = reopened.pinner().recursive_keys();
        pinned.sort();
        let mut expected = roots.clone();
        expected.sort();
        assert_eq!(pinned, expected);
        for (root, content) in roots.iter().zip(&contents) {
            assert_eq!(&reopened.dag().cat(root).await.unwrap(), content);
        }
    }

    #[tokio::test]
    async fn failing_domain_does_not_stop_the_other() {
        let state: Arc<dyn Blockstore> = Arc::new(UnlistableStore(InMemoryBlockstore::new()));
        let node = Arc::new(Node::with_stores(
            NodeConfig::default(),
            Arc::new(InMemoryBlockstore::new()),
            state,
        ));
        let stray = put_stray(&node, b"still collected").await;

        let result = GarbageCollector::new(node.clone())
            .collect(&CancellationToken::new())
            .await;
        assert!(matches!(result, Err(GcError::Store(_))));
        assert!(!node.data().store().has(&stray).await.unwrap());
    }

    #[tokio::test]
    async fn missing_pinned_block_fails_mark() {
        let node = node();
        let leaf = node.dag().add_built(&DagNode::file_leaf(b"leaf".to_vec())).await.unwrap();
        let mut parent = DagNode::file();
        parent.add_file_child(&leaf).unwrap();
        let root = node.dag().add(&parent).await.unwrap();
        node.pinner().pin(root, PinMode::Recursive).await.unwrap();
        node.data().store().delete(&leaf.key).await.unwrap();
        let stray = put_stray(&node, b"not deleted").await;

        let result = GarbageCollector::new(node.clone())
            .collect(&CancellationToken::new())
            .await;
        assert!(matches!(result, Err(GcError::Mark(_))));
        assert!(node.data().store().has(&stray).await.unwrap());
    }
}
