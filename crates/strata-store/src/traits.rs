use async_trait::async_trait;
use bytes::Bytes;
use strata_types::Key;

use crate::error::{StoreError, StoreResult};

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - Blocks are immutable once written. The same payload always produces
///   the same key, so `put` of an existing block is a no-op.
/// - `all_keys` returns a finite snapshot in unspecified order. Each call
///   restarts the enumeration.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait Blockstore: Send + Sync {
    /// Store a block and return its key.
    async fn put(&self, data: Bytes) -> StoreResult<Key>;

    /// Read a block by key. Returns `Ok(None)` if it does not exist.
    async fn get(&self, key: &Key) -> StoreResult<Option<Bytes>>;

    /// Check whether a block exists.
    async fn has(&self, key: &Key) -> StoreResult<bool>;

    /// Delete a block. Returns `true` if the block existed.
    ///
    /// Only the garbage collector should call this; deleting a block that
    /// is still linked from a pinned tree corrupts that tree.
    async fn delete(&self, key: &Key) -> StoreResult<bool>;

    /// Every key currently present in the store.
    async fn all_keys(&self) -> StoreResult<Vec<Key>>;

    /// Read a block, mapping absence to [`StoreError::NotFound`].
    async fn get_required(&self, key: &Key) -> StoreResult<Bytes> {
        self.get(key).await?.ok_or(StoreError::NotFound(*key))
    }
}
