//! Identity Recovery Module
//!
//! Rebuilds the name → id associations of all persistent maps from the
//! contents of the storage root.
//!
//! ## Responsibilities
//! - Create the storage root if it is missing
//! - Delete leftover temporary maps (never resumed across restarts)
//! - Parse `<mapName>-<mapId>` entries into a `NameIdTable`
//! - Resolve duplicate names by keeping the smallest id
//!
//! Runs once, single-threaded, before any map is opened. A failure part way
//! through aborts construction of the storage.

mod scan;
mod table;

pub use scan::{IdentityRecovery, RecoveryResult};
pub use table::NameIdTable;
