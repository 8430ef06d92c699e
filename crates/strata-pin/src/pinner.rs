use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strata_dag::DagService;
use strata_store::Blockstore;
use strata_types::Key;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{PinError, PinResult};
use crate::mode::PinMode;

const RECORD_VERSION: u32 = 1;

/// Persisted form of the pin set.
#[derive(Debug, Serialize, Deserialize)]
struct PinRecord {
    version: u32,
    direct: Vec<Key>,
    recursive: Vec<Key>,
}

#[derive(Clone, Debug, Default)]
struct PinState {
    direct: BTreeSet<Key>,
    recursive: BTreeSet<Key>,
    /// Blocks in the state domain that hold the flushed pin record.
    internal: BTreeSet<Key>,
}

/// The set of pinned roots.
///
/// Pins refer to nodes in the data domain (reached through `dag`); the
/// flushed record lives in the state domain (`state_store`). When a
/// `pointer` path is configured, `flush` also writes the record's key there
/// so that [`Pinner::load`] can restore the set after a restart.
///
/// Flushes run one at a time, each writing the pin set as it stands when
/// that flush starts, so the pointer always names the newest record.
pub struct Pinner {
    dag: DagService,
    state_store: Arc<dyn Blockstore>,
    pointer: Option<PathBuf>,
    state: RwLock<PinState>,
    flushing: Mutex<()>,
}

impl Pinner {
    pub fn new(dag: DagService, state_store: Arc<dyn Blockstore>, pointer: Option<PathBuf>) -> Self {
        Self {
            dag,
            state_store,
            pointer,
            state: RwLock::new(PinState::default()),
            flushing: Mutex::new(()),
        }
    }

    /// Restore the pin set from the record named by `pointer`, or start
    /// empty if the pointer file does not exist yet.
    pub async fn load(
        dag: DagService,
        state_store: Arc<dyn Blockstore>,
        pointer: PathBuf,
    ) -> PinResult<Self> {
        let pinner = Self::new(dag, state_store, Some(pointer.clone()));
        if !tokio::fs::try_exists(&pointer).await? {
            return Ok(pinner);
        }
        let key: Key = tokio::fs::read_to_string(&pointer).await?.parse()?;
        let bytes = pinner.state_store.get_required(&key).await?;
        let record: PinRecord = bincode::deserialize(&bytes).map_err(|e| PinError::Corrupt {
            key,
            reason: e.to_string(),
        })?;
        if record.version != RECORD_VERSION {
            return Err(PinError::Corrupt {
                key,
                reason: format!("unsupported record version {}", record.version),
            });
        }
        {
            let mut state = pinner.state.write().expect("pin lock poisoned");
            state.direct = record.direct.into_iter().collect();
            state.recursive = record.recursive.into_iter().collect();
            state.internal = BTreeSet::from([key]);
        }
        info!(record = %key.short_hex(), "loaded pin set");
        Ok(pinner)
    }

    pub fn pointer(&self) -> Option<&Path> {
        self.pointer.as_deref()
    }

    /// Pin `key` in `mode`.
    ///
    /// A recursive pin first walks the whole tree, so pinning fails if any
    /// descendant is missing. Pinning recursively again is a no-op, and a
    /// recursive pin replaces an existing direct pin of the same key.
    pub async fn pin(&self, key: Key, mode: PinMode) -> PinResult<()> {
        match mode {
            PinMode::Indirect => Err(PinError::IndirectNotAllowed),
            PinMode::Direct => {
                if self.is_recursive(&key) {
                    return Err(PinError::AlreadyRecursive(key));
                }
                if !self.dag.has(&key).await? {
                    return Err(PinError::NotFound(key));
                }
                self.write_state().direct.insert(key);
                debug!(key = %key.short_hex(), "pinned direct");
                Ok(())
            }
            PinMode::Recursive => {
                if self.is_recursive(&key) {
                    return Ok(());
                }
                if !self.dag.has(&key).await? {
                    return Err(PinError::NotFound(key));
                }
                let closure = self.dag.descendants(&key).await?;
                let mut state = self.write_state();
                state.direct.remove(&key);
                state.recursive.insert(key);
                debug!(key = %key.short_hex(), blocks = closure.len(), "pinned recursive");
                Ok(())
            }
        }
    }

    /// Remove a pin. Recursive pins are only removed when `recursive` is set.
    pub fn unpin(&self, key: &Key, recursive: bool) -> PinResult<()> {
        let mut state = self.write_state();
        if state.recursive.contains(key) {
            if !recursive {
                return Err(PinError::IsRecursive(*key));
            }
            state.recursive.remove(key);
        } else if !state.direct.remove(key) {
            return Err(PinError::NotPinned(*key));
        }
        debug!(key = %key.short_hex(), "unpinned");
        Ok(())
    }

    /// How `key` is retained, if at all. Indirect membership is found by
    /// walking every recursive pin.
    pub async fn pinned_mode(&self, key: &Key) -> PinResult<Option<PinMode>> {
        let roots = {
            let state = self.read_state();
            if state.recursive.contains(key) {
                return Ok(Some(PinMode::Recursive));
            }
            if state.direct.contains(key) {
                return Ok(Some(PinMode::Direct));
            }
            state.recursive.clone()
        };
        let mut visited = HashSet::new();
        for root in &roots {
            self.dag.walk_into(root, &mut visited).await?;
            if visited.contains(key) {
                return Ok(Some(PinMode::Indirect));
            }
        }
        Ok(None)
    }

    pub fn direct_keys(&self) -> Vec<Key> {
        self.read_state().direct.iter().copied().collect()
    }

    pub fn recursive_keys(&self) -> Vec<Key> {
        self.read_state().recursive.iter().copied().collect()
    }

    /// State-domain blocks holding the flushed pin record.
    pub fn internal_keys(&self) -> Vec<Key> {
        self.read_state().internal.iter().copied().collect()
    }

    /// Persist the pin set to the state domain and return the record key.
    pub async fn flush(&self) -> PinResult<Key> {
        let _flushing = self.flushing.lock().await;
        let record = {
            let state = self.read_state();
            PinRecord {
                version: RECORD_VERSION,
                direct: state.direct.iter().copied().collect(),
                recursive: state.recursive.iter().copied().collect(),
            }
        };
        let bytes = bincode::serialize(&record).map_err(|e| PinError::Encode(e.to_string()))?;
        let key = self.state_store.put(Bytes::from(bytes)).await?;
        if let Some(pointer) = &self.pointer {
            write_pointer(pointer.clone(), key).await?;
        }
        self.write_state().internal = BTreeSet::from([key]);
        debug!(
            record = %key.short_hex(),
            direct = record.direct.len(),
            recursive = record.recursive.len(),
            "flushed pin set"
        );
        Ok(key)
    }

    /// Every key the collector must keep: direct pins, internal records,
    /// and the full closure of every recursive pin.
    ///
    /// The pin sets are snapshotted once up front; the traversal then works
    /// on that snapshot. Recursive closures are walked before the direct
    /// and internal keys are added, so a directly pinned node inside a
    /// recursive tree still has its children walked.
    pub async fn retained_keys(&self) -> PinResult<HashSet<Key>> {
        let snapshot = self.read_state().clone();
        let mut retained = HashSet::new();
        for root in &snapshot.recursive {
            self.dag.walk_into(root, &mut retained).await?;
        }
        retained.extend(snapshot.direct.iter().chain(snapshot.internal.iter()).copied());
        Ok(retained)
    }

    fn is_recursive(&self, key: &Key) -> bool {
        self.read_state().recursive.contains(key)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, PinState> {
        self.state.read().expect("pin lock poisoned")
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, PinState> {
        self.state.write().expect("pin lock poisoned")
    }
}

/// Replace the pointer file atomically: a crash leaves either the old or
/// the new key, never a truncated one.
async fn write_pointer(pointer: PathBuf, key: Key) -> PinResult<()> {
    tokio::task::spawn_blocking(move || -> PinResult<()> {
        let dir = match pointer.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(key.to_hex().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&pointer).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| PinError::Task(e.to_string()))?
}

impl std::fmt::Debug for Pinner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("Pinner")
            .field("direct", &state.direct.len())
            .field("recursive", &state.recursive.len())
            .finish()
    }
}
