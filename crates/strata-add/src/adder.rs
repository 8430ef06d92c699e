//! The add pipeline.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use strata_dag::{BuilderParams, DagNode, Layout};
use strata_node::Node;
use strata_pin::PinMode;
use strata_types::Key;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{AddError, AddResult};
use crate::input::{DirectorySource, FileSource, InputNode};
use crate::object::AddedObject;
use crate::options::AddOptions;
use crate::progress::ProgressReader;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Why an item was left out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Hidden(String),
    Ignored(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden(path) => write!(f, "{path} is a hidden file"),
            Self::Ignored(path) => write!(f, "{path} is an ignored file"),
        }
    }
}

/// A persisted item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedNode {
    /// Path relative to the top-level input, as reported on the stream.
    pub name: String,
    pub key: Key,
    /// Cumulative size of the item's tree.
    pub size: u64,
}

/// Result of processing one item that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added(AddedNode),
    Skipped(SkipReason),
}

/// A running add started by [`Adder::spawn`].
///
/// `events` closes once the add task has finished, whether it succeeded or
/// not; `handle` then yields the pinned roots or the error.
pub struct AddSession {
    pub events: mpsc::Receiver<AddedObject>,
    pub handle: JoinHandle<AddResult<Vec<Key>>>,
}

impl AddSession {
    /// Drain every event, then wait for the task.
    pub async fn finish(mut self) -> (Vec<AddedObject>, AddResult<Vec<Key>>) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let result = match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(AddError::Task(e.to_string())),
        };
        (events, result)
    }
}

/// Adds files and directory trees to a node.
pub struct Adder {
    node: Arc<Node>,
    options: AddOptions,
    params: BuilderParams,
    progress_increment: u64,
    max_depth: usize,
    ignore: Option<Gitignore>,
}

impl Adder {
    /// With `only_hash`, all work happens on a scratch in-memory node and
    /// the given node is never touched.
    pub fn new(node: Arc<Node>, options: AddOptions) -> AddResult<Self> {
        let node = if options.only_hash {
            Arc::new(node.ephemeral())
        } else {
            node
        };
        let config = node.config();
        let ignore = if options.ignore.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new("");
            for pattern in &options.ignore {
                builder.add_line(None, pattern)?;
            }
            Some(builder.build()?)
        };
        Ok(Self {
            params: config.builder_params(),
            progress_increment: options.progress_increment.unwrap_or(config.progress_increment),
            max_depth: options.max_depth.unwrap_or(config.max_depth),
            node,
            options,
            ignore,
        })
    }

    /// The node blocks are written to.
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn options(&self) -> &AddOptions {
        &self.options
    }

    /// Run the add on a background task with a bounded output stream.
    pub fn spawn(self, inputs: Vec<InputNode>) -> AddSession {
        let (tx, events) = mpsc::channel(self.node.config().output_capacity.max(1));
        let handle = tokio::spawn(async move { self.add_all(inputs, &tx).await });
        AddSession { events, handle }
    }

    /// Add every input and return the pinned roots.
    ///
    /// With `wrap_with_directory` the inputs become entries of one unnamed
    /// directory, which is the single root. Otherwise each input is its own
    /// root; they are added in order and the first failure stops the rest,
    /// leaving earlier roots pinned.
    ///
    /// Without `recursive`, any directory among the inputs fails the whole
    /// add before anything is written, wrapped or not.
    pub async fn add_all(
        &self,
        inputs: Vec<InputNode>,
        out: &mpsc::Sender<AddedObject>,
    ) -> AddResult<Vec<Key>> {
        if !self.options.recursive {
            if let Some(dir) = inputs.iter().find(|input| input.is_dir()) {
                return Err(AddError::NotRecursive(dir.name().to_string()));
            }
        }
        if self.options.wrap_with_directory {
            let wrapper = InputNode::directory("", inputs);
            let added = self.add_root(wrapper, true, out).await?;
            return Ok(vec![added.key]);
        }
        let mut roots = Vec::with_capacity(inputs.len());
        for input in inputs {
            roots.push(self.add_item(input, out).await?.key);
        }
        Ok(roots)
    }

    /// Add one top-level item: build its tree, then pin and flush.
    pub async fn add_item(
        &self,
        input: InputNode,
        out: &mpsc::Sender<AddedObject>,
    ) -> AddResult<AddedNode> {
        self.add_root(input, false, out).await
    }

    async fn add_root(
        &self,
        input: InputNode,
        synthetic: bool,
        out: &mpsc::Sender<AddedObject>,
    ) -> AddResult<AddedNode> {
        if input.is_dir() && !synthetic && !self.options.recursive {
            return Err(AddError::NotRecursive(input.name().to_string()));
        }

        // Held until the root is pinned and the pin set flushed. Always data
        // first, then state.
        let _data_guard = self.node.data().add_lock().await;
        let _state_guard = self.node.state().add_lock().await;

        let path = input.name().to_string();
        let added = match self.add_node(input, path, 0, out).await? {
            AddOutcome::Added(added) => added,
            AddOutcome::Skipped(reason) => return Err(AddError::Skipped(reason)),
        };

        if !self.options.only_hash {
            let pinner = self.node.pinner();
            pinner.pin(added.key, PinMode::Recursive).await?;
            pinner.flush().await?;
        }
        info!(
            name = %added.name,
            key = %added.key.short_hex(),
            size = added.size,
            only_hash = self.options.only_hash,
            "added"
        );
        Ok(added)
    }

    fn skip_reason(&self, input: &InputNode, path: &str) -> Option<SkipReason> {
        if !self.options.hidden && input.is_hidden() {
            return Some(SkipReason::Hidden(path.to_string()));
        }
        let ignore = self.ignore.as_ref()?;
        if !path.is_empty() && ignore.matched(Path::new(path), input.is_dir()).is_ignore() {
            return Some(SkipReason::Ignored(path.to_string()));
        }
        None
    }

    fn add_node<'a>(
        &'a self,
        input: InputNode,
        path: String,
        depth: usize,
        out: &'a mpsc::Sender<AddedObject>,
    ) -> BoxFuture<'a, AddResult<AddOutcome>> {
        Box::pin(async move {
            if let Some(reason) = self.skip_reason(&input, &path) {
                debug!(%reason, "skipping");
                return Ok(AddOutcome::Skipped(reason));
            }
            if depth > self.max_depth {
                return Err(AddError::DepthLimitExceeded {
                    path,
                    max: self.max_depth,
                });
            }
            let added = match input {
                InputNode::File { source, .. } => self.add_file(source, path, out).await?,
                InputNode::Directory { entries, .. } => {
                    self.add_directory(entries, path, depth, out).await?
                }
            };
            out.send(AddedObject::Completed {
                name: added.name.clone(),
                hash: added.key,
            })
            .await
            .map_err(|_| AddError::OutputClosed)?;
            Ok(AddOutcome::Added(added))
        })
    }

    async fn add_file(
        &self,
        source: FileSource,
        path: String,
        out: &mpsc::Sender<AddedObject>,
    ) -> AddResult<AddedNode> {
        let reader = source.open().await?;
        let reader = ProgressReader::new(reader, path.clone(), self.progress_increment, out.clone());
        let built = self
            .node
            .dag()
            .build_from_reader(reader, self.layout(), &self.params)
            .await?;
        debug!(name = %path, key = %built.key.short_hex(), bytes = built.filesize, "added file");
        Ok(AddedNode {
            name: path,
            key: built.key,
            size: built.size,
        })
    }

    /// Children are processed in the order the source yields them. A
    /// skipped child is left out; any other failure abandons the directory
    /// before its node is written.
    async fn add_directory(
        &self,
        mut entries: Box<dyn DirectorySource>,
        path: String,
        depth: usize,
        out: &mpsc::Sender<AddedObject>,
    ) -> AddResult<AddedNode> {
        let mut dir = DagNode::directory();
        while let Some(child) = entries.next_entry().await? {
            let name = child.name().to_string();
            let child_path = if path.is_empty() {
                name.clone()
            } else {
                format!("{path}/{name}")
            };
            match self.add_node(child, child_path, depth + 1, out).await? {
                AddOutcome::Added(added) => dir.add_link(name, added.key, added.size)?,
                AddOutcome::Skipped(_) => {}
            }
        }
        let built = self.node.dag().add_built(&dir).await?;
        debug!(
            name = %path,
            key = %built.key.short_hex(),
            entries = dir.links().len(),
            "added directory"
        );
        Ok(AddedNode {
            name: path,
            key: built.key,
            size: built.size,
        })
    }

    fn layout(&self) -> Layout {
        self.options.layout()
    }
}

impl fmt::Debug for Adder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adder")
            .field("node", &self.node)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
