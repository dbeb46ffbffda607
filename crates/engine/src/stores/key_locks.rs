//! Per-scope async locks.
//!
//! Locate-or-create for a scope must not interleave: two redemptions for the
//! same (campaign, event, streamer) arriving together would otherwise both
//! see "no live instance" and both try to create one.

use std::sync::Arc;

use critcast_domain::ScopeKey;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by scope. Idle entries are pruned once the table grows.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<ScopeKey, Arc<Mutex<()>>>,
}

const PRUNE_THRESHOLD: usize = 1024;

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `scope`. Released when the guard drops.
    pub async fn lock(&self, scope: &ScopeKey) -> OwnedMutexGuard<()> {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune_idle();
        }

        let lock = self
            .locks
            .entry(scope.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on.
    pub fn prune_idle(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
