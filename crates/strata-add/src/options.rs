use serde::{Deserialize, Serialize};
use strata_dag::Layout;

/// Per-invocation add options.
///
/// `progress_increment` and `max_depth` fall back to the node's config when
/// unset. `quiet` and `progress` only matter to the reporting stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddOptions {
    /// Accept directory inputs.
    pub recursive: bool,
    /// Build files with the trickle layout instead of balanced.
    pub trickle: bool,
    /// Include entries whose name starts with a dot.
    pub hidden: bool,
    /// Compute hashes without persisting or pinning anything.
    pub only_hash: bool,
    /// Add all inputs under one unnamed directory root.
    pub wrap_with_directory: bool,
    /// Gitignore-style patterns matched against item paths.
    pub ignore: Vec<String>,
    pub progress_increment: Option<u64>,
    pub max_depth: Option<usize>,
    pub quiet: bool,
    pub progress: bool,
}

impl AddOptions {
    pub fn layout(&self) -> Layout {
        if self.trickle {
            Layout::Trickle
        } else {
            Layout::Balanced
        }
    }
}
