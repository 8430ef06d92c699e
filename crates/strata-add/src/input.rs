//! Input items for an add.
//!
//! An [`InputNode`] is a named file or directory. Files are read through an
//! async byte stream; directories hand out their entries one at a time
//! through a [`DirectorySource`]. An on-disk directory is listed once, when
//! its first entry is requested, and subdirectories only when the add
//! reaches them.

use std::collections::VecDeque;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;
use walkdir::WalkDir;

use crate::error::{AddError, AddResult};

/// Boxed byte stream for a file's content.
pub type FileReader = Box<dyn AsyncRead + Unpin + Send>;

/// Lazily yields the entries of one directory.
#[async_trait]
pub trait DirectorySource: Send {
    /// The next entry, or `None` once the directory is exhausted.
    async fn next_entry(&mut self) -> AddResult<Option<InputNode>>;
}

/// Where a file's bytes come from.
pub enum FileSource {
    Path(PathBuf),
    Bytes(Bytes),
    Reader(FileReader),
}

/// A named item to add.
pub enum InputNode {
    File { name: String, source: FileSource },
    Directory { name: String, entries: Box<dyn DirectorySource> },
}

impl InputNode {
    /// Input backed by the filesystem. The name is the path's last
    /// component. Directory entries are listed on demand, sorted by name.
    pub fn from_path(path: impl AsRef<Path>) -> AddResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_path_named(path.to_path_buf(), name)
    }

    fn from_path_named(path: PathBuf, name: String) -> AddResult<Self> {
        let meta = std::fs::metadata(&path)?;
        if meta.is_dir() {
            Ok(Self::Directory {
                name,
                entries: Box::new(FsDirectory::new(path)),
            })
        } else {
            Ok(Self::File {
                name,
                source: FileSource::Path(path),
            })
        }
    }

    /// An in-memory file.
    pub fn file(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::File {
            name: name.into(),
            source: FileSource::Bytes(data.into()),
        }
    }

    /// A file read from an arbitrary stream, such as stdin.
    pub fn reader(name: impl Into<String>, reader: impl AsyncRead + Unpin + Send + 'static) -> Self {
        Self::File {
            name: name.into(),
            source: FileSource::Reader(Box::new(reader)),
        }
    }

    /// An in-memory directory. Entries are yielded in the given order.
    pub fn directory(name: impl Into<String>, children: Vec<InputNode>) -> Self {
        Self::Directory {
            name: name.into(),
            entries: Box::new(MemoryDirectory {
                children: children.into(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }

    /// Names starting with a dot are hidden. `.` and `..` are not.
    pub fn is_hidden(&self) -> bool {
        let name = self.name();
        name.starts_with('.') && name != "." && name != ".."
    }
}

impl fmt::Debug for InputNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { name, .. } => f.debug_struct("File").field("name", name).finish(),
            Self::Directory { name, .. } => f.debug_struct("Directory").field("name", name).finish(),
        }
    }
}

impl FileSource {
    pub async fn open(self) -> AddResult<FileReader> {
        Ok(match self {
            Self::Path(path) => Box::new(tokio::fs::File::open(path).await?),
            Self::Bytes(bytes) => Box::new(Cursor::new(bytes)),
            Self::Reader(reader) => reader,
        })
    }
}

struct MemoryDirectory {
    children: VecDeque<InputNode>,
}

#[async_trait]
impl DirectorySource for MemoryDirectory {
    async fn next_entry(&mut self) -> AddResult<Option<InputNode>> {
        Ok(self.children.pop_front())
    }
}

/// A directory on disk. The listing is read on the first call.
struct FsDirectory {
    path: PathBuf,
    pending: Option<VecDeque<(PathBuf, String)>>,
}

impl FsDirectory {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            pending: None,
        }
    }

    fn list(path: &Path) -> AddResult<VecDeque<(PathBuf, String)>> {
        let mut entries = VecDeque::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let msg = e.to_string();
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(msg))
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push_back((entry.into_path(), name));
        }
        Ok(entries)
    }
}

#[async_trait]
impl DirectorySource for FsDirectory {
    async fn next_entry(&mut self) -> AddResult<Option<InputNode>> {
        if self.pending.is_none() {
            let path = self.path.clone();
            let listed = tokio::task::spawn_blocking(move || Self::list(&path))
                .await
                .map_err(|e| AddError::Task(e.to_string()))??;
            self.pending = Some(listed);
        }
        match self.pending.as_mut().and_then(VecDeque::pop_front) {
            Some((path, name)) => InputNode::from_path_named(path, name).map(Some),
            None => Ok(None),
        }
    }
}
