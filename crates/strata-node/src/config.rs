use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_dag::importer::{DEFAULT_LAYER_REPEAT, DEFAULT_MAX_LINKS};
use strata_dag::{BuilderParams, DEFAULT_CHUNK_SIZE};

use crate::error::{NodeError, NodeResult};

/// File name of the config inside a repository.
pub const CONFIG_FILE: &str = "config.toml";

/// Node configuration, persisted as TOML at `<repo>/config.toml`.
///
/// Missing fields fall back to their defaults, so an empty file is valid.
/// `repo_path` is not stored; it is the directory the file was loaded from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    #[serde(skip)]
    pub repo_path: PathBuf,
    pub chunk_size: usize,
    pub max_links: usize,
    pub layer_repeat: usize,
    /// Bytes between two progress reports for one file.
    pub progress_increment: u64,
    /// Capacity of the add and gc output channels.
    pub output_capacity: usize,
    /// Deepest directory nesting accepted by an add.
    pub max_depth: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from(".strata"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_links: DEFAULT_MAX_LINKS,
            layer_repeat: DEFAULT_LAYER_REPEAT,
            progress_increment: 256 * 1024,
            output_capacity: 8,
            max_depth: 64,
        }
    }
}

impl NodeConfig {
    /// Defaults rooted at `repo_path`.
    pub fn with_repo(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            ..Self::default()
        }
    }

    pub fn builder_params(&self) -> BuilderParams {
        BuilderParams {
            chunk_size: self.chunk_size,
            max_links: self.max_links,
            layer_repeat: self.layer_repeat,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.repo_path.join(CONFIG_FILE)
    }

    pub fn blocks_path(&self) -> PathBuf {
        self.repo_path.join("blocks")
    }

    pub fn state_path(&self) -> PathBuf {
        self.repo_path.join("state")
    }

    pub fn pins_path(&self) -> PathBuf {
        self.repo_path.join("pins")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.repo_path.join("repo.lock")
    }

    /// Read a config file; `repo_path` becomes the file's directory.
    pub fn load(path: impl AsRef<Path>) -> NodeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                NodeError::NotInitialized(path.parent().unwrap_or(path).to_path_buf())
            }
            _ => NodeError::Io(e),
        })?;
        let mut config: NodeConfig = toml::from_str(&text)?;
        if let Some(dir) = path.parent() {
            config.repo_path = dir.to_path_buf();
        }
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> NodeResult<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
