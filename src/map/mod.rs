//! Map Module
//!
//! The contract between the registry and the maps it manages.
//!
//! ## Responsibilities
//! - `StorageMap`: what the registry needs from an open map (save, close)
//! - `MapOpener`: how the registry turns a descriptor into an open map
//! - `LogMap`: the bundled file-backed implementation
//!
//! The registry never looks inside a map. Keys, values and the record
//! format are entirely the map implementation's business.

mod log_map;

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::Result;

pub use log_map::{LogMap, LogMapOpener};

/// An open, persistent map as seen by the registry and the scheduler
pub trait StorageMap: Send + Sync {
    /// Logical map name (without the id suffix)
    fn name(&self) -> &str;

    /// Generation id the map was opened with
    fn id(&self) -> u32;

    /// Durably flush pending changes. Idempotent.
    fn save(&self) -> Result<()>;

    /// Final save and release of resources. Called at most once.
    fn close(&self) -> Result<()>;
}

/// Key/value type descriptor handed to the map implementation
///
/// `None` in a `MapDescriptor` means "use the map's default encoding".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Bytes,
    String,
    Int,
    Long,
    Object,
    Custom(String),
}

/// Everything needed to open one map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDescriptor {
    pub id: u32,
    pub name: String,
    pub key_type: Option<DataType>,
    pub value_type: Option<DataType>,
}

impl MapDescriptor {
    /// On-disk name of the map: `<name>-<id>`
    pub fn full_name(&self) -> String {
        crate::naming::map_full_name(&self.name, self.id)
    }
}

/// Factory for the concrete map type a `LogStorage` manages
pub trait MapOpener: Send + Sync {
    type Map: StorageMap + 'static;

    /// Open (or create) the map described by `descriptor`
    fn open(&self, descriptor: MapDescriptor, config: &Arc<StorageConfig>) -> Result<Self::Map>;
}
