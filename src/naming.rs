//! Map Naming Convention
//!
//! Every map lives under the storage root as `<mapName>-<mapId>`, the id in
//! decimal with no leading zeros. Temporary maps are named `temp-<n>` and are
//! purged on the next startup.
//!
//! ```text
//!   orders-3        →  ("orders", 3)
//!   user-events-12  →  ("user-events", 12)   split at the LAST separator
//!   temp-4          →  deleted during recovery
//!   README          →  skipped (no separator)
//!   -7              →  skipped (separator at position 0)
//!   orders-x1       →  error (corrupt id suffix)
//! ```

use crate::error::{LogError, Result};

/// Separator between a map name and its id
pub const MAP_NAME_ID_SEPARATOR: char = '-';

/// Prefix of every temporary map name
pub const TEMP_MAP_NAME_PREFIX: &str = "temp-";

/// Render the on-disk name of a map
pub fn map_full_name(name: &str, id: u32) -> String {
    format!("{}{}{}", name, MAP_NAME_ID_SEPARATOR, id)
}

/// Render the name of the n-th temporary map
pub fn temp_map_name(n: u32) -> String {
    format!("{}{}", TEMP_MAP_NAME_PREFIX, n)
}

/// Whether a directory entry is a leftover temporary map
pub fn is_temp_map_name(full_name: &str) -> bool {
    full_name.starts_with(TEMP_MAP_NAME_PREFIX)
}

/// Split an on-disk name into `(mapName, mapId)`
///
/// Returns:
/// - `Ok(Some(..))` — a recognized map entry
/// - `Ok(None)` — not a map entry (no separator, or separator at position 0)
/// - `Err(CorruptMapName)` — looks like a map entry but the id is not a number
pub fn parse_map_full_name(full_name: &str) -> Result<Option<(&str, u32)>> {
    let pos = match full_name.rfind(MAP_NAME_ID_SEPARATOR) {
        Some(pos) if pos > 0 => pos,
        _ => return Ok(None),
    };

    let name = &full_name[..pos];
    let id_str = &full_name[pos + MAP_NAME_ID_SEPARATOR.len_utf8()..];
    let id = id_str
        .parse::<u32>()
        .map_err(|source| LogError::CorruptMapName {
            name: full_name.to_string(),
            source,
        })?;

    Ok(Some((name, id)))
}
