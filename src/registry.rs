//! Map Registry
//!
//! The set of open maps the flush scheduler walks on every cycle.
//!
//! ## Concurrency
//! Copy-on-write: the entry list lives in an `Arc<Vec<_>>`. Appends build a
//! new vector under a short write lock and swap it in; a flush pass clones
//! the `Arc` and iterates without holding any lock, so it may miss entries
//! appended mid-pass. That is fine, a brand new map has nothing to save yet.
//!
//! ## Ownership
//! Entries are `Weak`: the caller owns the map. A map dropped by its owner
//! simply stops being saved and is pruned on the next append.
//!
//! ## Sharing
//! One registry is normally shared by every `LogStorage` in the process
//! (`MapRegistry::global()`), so any live scheduler saves every instance's
//! maps. Tests inject their own registry to stay isolated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use crate::map::StorageMap;

/// Identifies the `LogStorage` instance an entry belongs to
pub type OwnerId = u64;

/// One registered map
#[derive(Clone)]
pub struct RegistryEntry {
    owner: OwnerId,
    map: Weak<dyn StorageMap>,
}

impl RegistryEntry {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// The map, if its owner still holds it
    pub fn map(&self) -> Option<Arc<dyn StorageMap>> {
        self.map.upgrade()
    }
}

/// Outcome of one flush pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    pub saved: usize,
    pub failed: usize,
}

/// Shared collection of open maps
pub struct MapRegistry {
    entries: RwLock<Arc<Vec<RegistryEntry>>>,
    next_owner_id: AtomicU64,
}

impl MapRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            next_owner_id: AtomicU64::new(1),
        }
    }

    /// The process-wide registry
    pub fn global() -> Arc<MapRegistry> {
        static GLOBAL: OnceLock<Arc<MapRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(MapRegistry::new())))
    }

    /// Hand out a fresh owner id for a new storage instance
    pub fn next_owner_id(&self) -> OwnerId {
        self.next_owner_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a map on behalf of `owner`
    pub fn register(&self, owner: OwnerId, map: Weak<dyn StorageMap>) {
        let mut entries = self.entries.write();
        let mut next: Vec<RegistryEntry> = entries
            .iter()
            .filter(|e| e.map.strong_count() > 0)
            .cloned()
            .collect();
        next.push(RegistryEntry { owner, map });
        *entries = Arc::new(next);
    }

    /// Drop every entry belonging to `owner`, returning how many were removed
    pub fn unregister_owner(&self, owner: OwnerId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        let next: Vec<RegistryEntry> = entries
            .iter()
            .filter(|e| e.owner != owner)
            .cloned()
            .collect();
        let removed = before - next.len();
        *entries = Arc::new(next);
        removed
    }

    /// Current entries, safe to iterate while others register
    pub fn snapshot(&self) -> Arc<Vec<RegistryEntry>> {
        self.entries.read().clone()
    }

    /// Number of entries (live or not yet pruned)
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of entries belonging to `owner`
    pub fn owner_len(&self, owner: OwnerId) -> usize {
        self.entries.read().iter().filter(|e| e.owner == owner).count()
    }

    /// Save every live map once
    ///
    /// Failures are logged and skipped; the next pass tries again.
    pub fn save_all(&self) -> FlushStats {
        let mut stats = FlushStats::default();

        for entry in self.snapshot().iter() {
            let Some(map) = entry.map() else {
                continue;
            };

            match map.save() {
                Ok(()) => stats.saved += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(
                        "Scheduled save of map '{}' (id {}) failed: {}",
                        map.name(),
                        map.id(),
                        e
                    );
                }
            }
        }

        stats
    }
}

impl Default for MapRegistry {
    fn default() -> Self {
        Self::new()
    }
}
