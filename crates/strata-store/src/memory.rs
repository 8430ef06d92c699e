use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use strata_crypto::ContentHasher;
use strata_types::Key;

use crate::error::StoreResult;
use crate::traits::Blockstore;

/// In-memory, HashMap-based block store.
///
/// Intended for tests, embedding, and hash-only adds whose blocks must not
/// outlive the operation. Blocks are reference-counted [`Bytes`], so reads
/// do not copy payloads.
pub struct InMemoryBlockstore {
    blocks: RwLock<HashMap<Key, Bytes>>,
}

impl InMemoryBlockstore {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().expect("lock poisoned").is_empty()
    }

    /// Total payload bytes across all stored blocks.
    pub fn total_bytes(&self) -> u64 {
        self.blocks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }

    /// Sorted list of all keys. Test helper; [`Blockstore::all_keys`] is
    /// unordered.
    pub fn sorted_keys(&self) -> Vec<Key> {
        let map = self.blocks.read().expect("lock poisoned");
        let mut keys: Vec<Key> = map.keys().copied().collect();
        keys.sort();
        keys
    }
}

impl Default for InMemoryBlockstore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Blockstore for InMemoryBlockstore {
    async fn put(&self, data: Bytes) -> StoreResult<Key> {
        let key = ContentHasher::BLOCK.hash(&data);
        let mut map = self.blocks.write().expect("lock poisoned");
        map.entry(key).or_insert(data);
        Ok(key)
    }

    async fn get(&self, key: &Key) -> StoreResult<Option<Bytes>> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn has(&self, key: &Key) -> StoreResult<bool> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }

    async fn delete(&self, key: &Key) -> StoreResult<bool> {
        let mut map = self.blocks.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    async fn all_keys(&self) -> StoreResult<Vec<Key>> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.keys().copied().collect())
    }
}

impl std::fmt::Debug for InMemoryBlockstore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockstore")
            .field("block_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryBlockstore::new();
        let key = store.put(Bytes::from_static(b"hello world")).await.unwrap();
        let read_back = store.get(&key).await.unwrap().expect("should exist");
        assert_eq!(&read_back[..], b"hello world");
        assert_eq!(key, ContentHasher::BLOCK.hash(b"hello world"));
    }

    #[tokio::test]
    async fn same_content_produces_same_key() {
        let store = InMemoryBlockstore::new();
        let k1 = store.put(Bytes::from_static(b"identical")).await.unwrap();
        let k2 = store.put(Bytes::from_static(b"identical")).await.unwrap();
        assert_eq!(k1, k2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_present_and_missing() {
        let store = InMemoryBlockstore::new();
        let key = store.put(Bytes::from_static(b"to-delete")).await.unwrap();
        assert!(store.delete(&key).await.unwrap());
        assert!(!store.has(&key).await.unwrap());
        assert!(!store.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn get_required_maps_absence() {
        let store = InMemoryBlockstore::new();
        let missing = Key::digest(b"missing");
        assert!(store.get(&missing).await.unwrap().is_none());
        let err = store.get_required(&missing).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(k) if k == missing));
    }

    #[tokio::test]
    async fn all_keys_lists_everything() {
        let store = InMemoryBlockstore::new();
        let a = store.put(Bytes::from_static(b"a")).await.unwrap();
        let b = store.put(Bytes::from_static(b"b")).await.unwrap();
        let mut keys = store.all_keys().await.unwrap();
        keys.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(store.sorted_keys(), expected);
    }

    #[tokio::test]
    async fn total_bytes_and_debug() {
        let store = InMemoryBlockstore::default();
        assert!(store.is_empty());
        store.put(Bytes::from_static(b"12345")).await.unwrap();
        store.put(Bytes::from_static(b"123456789")).await.unwrap();
        assert_eq!(store.total_bytes(), 14);
        assert!(format!("{store:?}").contains("block_count"));
    }
}
