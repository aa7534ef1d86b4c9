//! Storage root scan
//!
//! Walks the storage root once and turns map directory names into ids.

use std::path::Path;

use crate::error::{LogError, Result};
use crate::fs::FileSystem;
use crate::naming;

use super::NameIdTable;

/// Recovers map identities from a storage root
pub struct IdentityRecovery;

/// Result of a recovery pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of `<name>-<id>` entries accepted (duplicates included)
    pub maps_recovered: u64,

    /// Number of leftover temporary maps deleted
    pub temp_maps_deleted: u64,

    /// Number of entries that are not map names
    pub entries_skipped: u64,

    /// Number of entries whose name was already in the table
    pub duplicates_resolved: u64,

    /// Whether the storage root had to be created
    pub created_root: bool,
}

impl IdentityRecovery {
    /// Recover the name → id table from `root`
    ///
    /// This will:
    /// 1. Create `root` if it does not exist (nothing to recover then)
    /// 2. Delete every `temp-*` entry
    /// 3. Parse every other entry as `<name>-<id>`, skipping non-map names
    /// 4. Keep the smallest id per name
    ///
    /// A non-numeric id suffix is a hard error: it means corruption or a
    /// collision with foreign files, and must not be skipped silently.
    pub fn recover(fs: &dyn FileSystem, root: &Path) -> Result<(NameIdTable, RecoveryResult)> {
        let table = NameIdTable::new();
        let mut result = RecoveryResult::default();

        if !fs.exists(root) {
            fs.create_dir_all(root).map_err(|e| {
                LogError::Config(format!("cannot create storage root {}: {}", root.display(), e))
            })?;
            result.created_root = true;
            tracing::debug!("Created storage root {}", root.display());
            return Ok((table, result));
        }

        for entry in fs.list(root)? {
            if naming::is_temp_map_name(&entry.name) {
                fs.delete(&entry.path)?;
                result.temp_maps_deleted += 1;
                tracing::debug!("Deleted leftover temporary map {}", entry.name);
                continue;
            }

            match naming::parse_map_full_name(&entry.name)? {
                Some((name, id)) => {
                    if let Some(kept) = table.insert(name, id) {
                        result.duplicates_resolved += 1;
                        tracing::warn!(
                            "Duplicate map name '{}' (id {}), keeping id {}",
                            name,
                            id,
                            kept
                        );
                    }
                    result.maps_recovered += 1;
                }
                None => {
                    result.entries_skipped += 1;
                }
            }
        }

        Ok((table, result))
    }
}
