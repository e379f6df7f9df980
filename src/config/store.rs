use crate::config::snapshot::ConfigSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Current configuration snapshot shared with every hook
///
/// Readers clone the `Arc` and work on an immutable snapshot; writers swap
/// in a whole replacement. There are no field-level updates.
///
/// Every publish bumps a private generation counter. Caches key on the
/// generation, not on the payload's `version`, which the boundary does not
/// have to change between deliveries.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<ConfigSnapshot>>,
    generation: AtomicU64,
}

impl SnapshotStore {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> Arc<ConfigSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Number of snapshots published since construction
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Current snapshot together with the generation it was published at
    ///
    /// Both are read under the same lock, so the pair is consistent.
    pub fn current_with_generation(&self) -> (u64, Arc<ConfigSnapshot>) {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        (self.generation.load(Ordering::Acquire), Arc::clone(&guard))
    }

    pub fn version(&self) -> u64 {
        self.current().version
    }

    /// Publish a whole replacement snapshot
    pub fn replace(&self, snapshot: ConfigSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        info!(
            target: "idveil::config",
            "Configuration snapshot {} -> {} ({} profiles, {} assignments, module_enabled={})",
            guard.version,
            snapshot.version,
            snapshot.profiles.len(),
            snapshot.assignments.len(),
            snapshot.module_enabled
        );
        *guard = Arc::new(snapshot);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Derive a new snapshot from the current one and publish it
    ///
    /// The write lock is held across `edit`, so concurrent updates are
    /// applied one after another rather than lost.
    pub fn update<E, F>(&self, edit: F) -> Result<Arc<ConfigSnapshot>, E>
    where
        F: FnOnce(&ConfigSnapshot) -> Result<ConfigSnapshot, E>,
    {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let current: &ConfigSnapshot = &guard;
        let next = Arc::new(edit(current)?);
        debug!(
            target: "idveil::config",
            "Configuration updated {} -> {}",
            guard.version,
            next.version
        );
        *guard = Arc::clone(&next);
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(next)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(ConfigSnapshot::default())
    }
}
