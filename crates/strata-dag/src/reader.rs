use strata_types::Key;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{DagError, DagResult};
use crate::service::DagService;

/// Streams a file's bytes back out of the DAG.
///
/// Nodes are visited depth-first in link order; each node contributes its
/// inline data before its children. This is the exact inverse of both
/// layouts in [`importer`](crate::importer).
pub struct DagReader<'a> {
    dag: &'a DagService,
    stack: Vec<Key>,
}

impl<'a> DagReader<'a> {
    pub fn new(dag: &'a DagService, root: Key) -> Self {
        Self {
            dag,
            stack: vec![root],
        }
    }

    /// Next non-empty run of file bytes, or `None` when the file is done.
    pub async fn next_block(&mut self) -> DagResult<Option<Vec<u8>>> {
        while let Some(key) = self.stack.pop() {
            let node = self.dag.get(&key).await?;
            if node.is_directory() {
                return Err(DagError::NotAFile(key));
            }
            self.stack
                .extend(node.links().iter().rev().map(|link| link.key));
            let data = node.inline_data();
            if !data.is_empty() {
                return Ok(Some(data.to_vec()));
            }
        }
        Ok(None)
    }
}

impl DagService {
    /// Copy the file rooted at `key` into `writer`. Returns bytes written.
    pub async fn write_to<W>(&self, key: &Key, writer: &mut W) -> DagResult<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut reader = DagReader::new(self, *key);
        let mut written = 0u64;
        while let Some(block) = reader.next_block().await? {
            writer.write_all(&block).await?;
            written += block.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    /// Reassemble the file rooted at `key` in memory.
    pub async fn cat(&self, key: &Key) -> DagResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(key, &mut out).await?;
        Ok(out)
    }
}
