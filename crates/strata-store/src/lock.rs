//! The two-mode add/collect lock guarding a block domain.
//!
//! Ingestion writes blocks before they are linked into a tree and before
//! that tree is pinned. A garbage collector that computed its retained set
//! in that window would delete them. [`GcLock`] closes the window:
//!
//! - any number of writers hold the shared *add* mode at once;
//! - the collector takes the exclusive *collect* mode, which waits until
//!   every add holder has released and keeps new ones out until the sweep
//!   of that domain is finished.
//!
//! Acquisition returns a guard; dropping the guard releases the lock, so
//! every exit path (including `?` early returns and panics) releases it.

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Shared/exclusive lock pair for one block domain.
///
/// Cloning yields another handle to the same lock.
#[derive(Clone, Debug, Default)]
pub struct GcLock {
    inner: Arc<RwLock<()>>,
}

/// Held by an in-flight add. Released on drop.
#[derive(Debug)]
pub struct AddGuard {
    _guard: OwnedRwLockReadGuard<()>,
}

/// Held by the garbage collector while it marks and sweeps. Released on drop.
#[derive(Debug)]
pub struct CollectGuard {
    _guard: OwnedRwLockWriteGuard<()>,
}

impl GcLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the shared add mode, waiting while a collection holds the
    /// domain.
    pub async fn add_lock(&self) -> AddGuard {
        AddGuard {
            _guard: Arc::clone(&self.inner).read_owned().await,
        }
    }

    /// Acquire the exclusive collect mode, waiting for all add holders.
    pub async fn collect_lock(&self) -> CollectGuard {
        CollectGuard {
            _guard: Arc::clone(&self.inner).write_owned().await,
        }
    }

    /// Take the collect mode only if no add is in flight.
    pub fn try_collect_lock(&self) -> Option<CollectGuard> {
        Arc::clone(&self.inner)
            .try_write_owned()
            .ok()
            .map(|guard| CollectGuard { _guard: guard })
    }

    /// Take the add mode only if no collection holds the domain.
    pub fn try_add_lock(&self) -> Option<AddGuard> {
        Arc::clone(&self.inner)
            .try_read_owned()
            .ok()
            .map(|guard| AddGuard { _guard: guard })
    }
}
