//! Name → id table
//!
//! Filled once by recovery, then only read while maps are opened. Cleared
//! when the owning storage closes.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Mapping from map name to its recovered id
///
/// ## Invariant
/// At most one id per name. When the same name is inserted twice the
/// smaller id is kept: the oldest surviving generation is canonical, newer
/// ids are treated as superseded partial writes.
#[derive(Debug, Default)]
pub struct NameIdTable {
    ids: RwLock<HashMap<String, u32>>,
}

impl NameIdTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `(name, id)`, keeping the smaller id on conflict
    ///
    /// Returns the id kept for `name` if this insert collided with an
    /// existing entry, `None` for a first insert.
    pub fn insert(&self, name: &str, id: u32) -> Option<u32> {
        let mut ids = self.ids.write();
        match ids.get_mut(name) {
            Some(existing) => {
                if id < *existing {
                    *existing = id;
                }
                Some(*existing)
            }
            None => {
                ids.insert(name.to_string(), id);
                None
            }
        }
    }

    /// Look up the id recovered for `name`
    pub fn get(&self, name: &str) -> Option<u32> {
        self.ids.read().get(name).copied()
    }

    /// Number of recovered names
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> HashMap<String, u32> {
        self.ids.read().clone()
    }

    /// Drop every entry (storage shutdown)
    pub fn clear(&self) {
        self.ids.write().clear();
    }
}
