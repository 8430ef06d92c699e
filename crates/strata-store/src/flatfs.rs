use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use strata_crypto::ContentHasher;
use strata_types::Key;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::Blockstore;

/// Number of leading hex characters used as the shard directory name.
const SHARD_PREFIX_LEN: usize = 2;

/// Filesystem block store: one file per block.
///
/// Blocks live at `<root>/<first two hex chars>/<full hex key>`. Writes go
/// through a temporary file in the shard directory followed by a rename, so
/// a reader never observes a partially written block. Reads recompute the
/// hash and reject corrupted files.
#[derive(Debug, Clone)]
pub struct FlatFsBlockstore {
    root: PathBuf,
}

impl FlatFsBlockstore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened flatfs blockstore");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_dir(&self, key: &Key) -> PathBuf {
        let hex = key.to_hex();
        self.root.join(&hex[..SHARD_PREFIX_LEN])
    }

    fn block_path(&self, key: &Key) -> PathBuf {
        self.shard_dir(key).join(key.to_hex())
    }
}

#[async_trait]
impl Blockstore for FlatFsBlockstore {
    async fn put(&self, data: Bytes) -> StoreResult<Key> {
        let key = ContentHasher::BLOCK.hash(&data);
        let path = self.block_path(&key);
        if tokio::fs::try_exists(&path).await? {
            return Ok(key);
        }

        let dir = self.shard_dir(&key);
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        debug!(key = %key.short_hex(), "wrote block");
        Ok(key)
    }

    async fn get(&self, key: &Key) -> StoreResult<Option<Bytes>> {
        let data = match tokio::fs::read(self.block_path(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let computed = ContentHasher::BLOCK.hash(&data);
        if computed != *key {
            return Err(StoreError::HashMismatch {
                key: *key,
                computed,
            });
        }
        Ok(Some(Bytes::from(data)))
    }

    async fn has(&self, key: &Key) -> StoreResult<bool> {
        Ok(tokio::fs::try_exists(self.block_path(key)).await?)
    }

    async fn delete(&self, key: &Key) -> StoreResult<bool> {
        match tokio::fs::remove_file(self.block_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn all_keys(&self) -> StoreResult<Vec<Key>> {
        let mut keys = Vec::new();
        let mut shards = tokio::fs::read_dir(&self.root).await?;
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = tokio::fs::read_dir(shard.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                match name.to_str().map(Key::from_hex) {
                    Some(Ok(key)) => keys.push(key),
                    // Leftover temp files from an interrupted write.
                    _ => warn!(path = %entry.path().display(), "ignoring non-block file"),
                }
            }
        }
        Ok(keys)
    }
}
