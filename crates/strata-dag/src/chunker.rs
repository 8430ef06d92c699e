use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Default chunk size: 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Fixed-size chunker over an async byte stream.
///
/// Every chunk is exactly `chunk_size` bytes except the last, which holds
/// whatever remains. The splitter keeps reading until the underlying reader
/// reports end of stream, so wrappers that act on EOF always observe it.
pub struct Splitter<R> {
    reader: R,
    chunk_size: usize,
    done: bool,
}

impl<R: AsyncRead + Unpin> Splitter<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }

    /// `true` once the reader has reported end of stream.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Read the next chunk, or `None` at end of stream.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                self.done = true;
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
