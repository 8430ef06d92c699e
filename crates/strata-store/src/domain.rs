use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::lock::{AddGuard, CollectGuard, GcLock};
use crate::traits::Blockstore;

/// Which of a node's two block domains a store belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainKind {
    /// File and directory nodes written by adds.
    Data,
    /// Internal records such as the flushed pin set.
    State,
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => write!(f, "data"),
            Self::State => write!(f, "state"),
        }
    }
}

/// A block store together with the add/collect lock that guards it.
#[derive(Clone)]
pub struct BlockDomain {
    kind: DomainKind,
    store: Arc<dyn Blockstore>,
    lock: GcLock,
}

impl BlockDomain {
    pub fn new(kind: DomainKind, store: Arc<dyn Blockstore>) -> Self {
        Self {
            kind,
            store,
            lock: GcLock::new(),
        }
    }

    pub fn kind(&self) -> DomainKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<dyn Blockstore> {
        &self.store
    }

    pub fn lock(&self) -> &GcLock {
        &self.lock
    }

    /// Shorthand for `self.lock().add_lock()`.
    pub async fn add_lock(&self) -> AddGuard {
        self.lock.add_lock().await
    }

    /// Shorthand for `self.lock().collect_lock()`.
    pub async fn collect_lock(&self) -> CollectGuard {
        self.lock.collect_lock().await
    }
}

impl fmt::Debug for BlockDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDomain").field("kind", &self.kind).finish()
    }
}
