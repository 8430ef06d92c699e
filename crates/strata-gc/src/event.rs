use serde::{Deserialize, Serialize};
use strata_store::DomainKind;
use strata_types::Key;

use crate::error::GcError;

/// One block deleted by a sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRemoved {
    pub key: Key,
    pub domain: DomainKind,
}

/// An item on the asynchronous collection stream. `Error` is always the
/// last item.
#[derive(Debug)]
pub enum GcEvent {
    Removed(KeyRemoved),
    Error(GcError),
}

/// Totals of a finished collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcStats {
    pub data_removed: usize,
    pub state_removed: usize,
}

impl GcStats {
    pub fn record(&mut self, removed: &KeyRemoved) {
        match removed.domain {
            DomainKind::Data => self.data_removed += 1,
            DomainKind::State => self.state_removed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.data_removed + self.state_removed
    }
}
