//! Log Storage
//!
//! The entry point: owns the recovered name → id table, opens maps, and
//! drives their saving.
//!
//! ## Responsibilities
//! - Recover map identities from the storage root on startup
//! - Open maps (named or temporary) and register them for saving
//! - Run the periodic flush scheduler
//! - Synchronous commit and close

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::config::StorageConfig;
use crate::error::{LogError, Result};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::map::{DataType, LogMapOpener, MapDescriptor, MapOpener, StorageMap};
use crate::naming;
use crate::recovery::{IdentityRecovery, NameIdTable, RecoveryResult};
use crate::registry::{MapRegistry, OwnerId};
use crate::scheduler::{FlushScheduler, SchedulerState};

/// Registry and lifecycle manager for a set of persistent maps
///
/// ## Concurrency Model
///
/// - **open_map**: callable from any thread. Registration is copy-on-write,
///   so it never waits for a flush pass to finish.
/// - **create_temp_map**: serialized by `next_temp_map_id` so no two temp
///   maps get the same name.
/// - **commit / close**: serialized against each other by `lifecycle_lock`.
///   Commit works on a copy of the map list and does not block `open_map`.
/// - **Background saves**: one scheduler thread per instance walks the
///   *shared* registry, so it saves maps of every instance registered there.
pub struct LogStorage<O: MapOpener = LogMapOpener> {
    /// Tag for this instance's registry entries
    owner: OwnerId,

    /// Shared, read-only configuration handed to every map
    config: Arc<StorageConfig>,

    /// Produces the concrete maps
    opener: O,

    /// Recovered name → id associations
    ids: NameIdTable,

    /// Statistics of the startup scan
    recovery: RecoveryResult,

    /// Registry walked by the flush scheduler (usually process-wide)
    registry: Arc<MapRegistry>,

    /// Maps opened through this instance
    maps: RwLock<Vec<Arc<O::Map>>>,

    /// Counter behind `temp-<n>` names; the lock is the temp-map critical section
    next_temp_map_id: Mutex<u32>,

    /// Serializes commit and close
    lifecycle_lock: Mutex<()>,

    scheduler: FlushScheduler,

    closed: AtomicBool,
}

impl LogStorage<LogMapOpener> {
    /// Open with default file-backed maps under `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = StorageConfig::builder().storage_name(path).build();
        Self::open(config, LogMapOpener)
    }
}

impl<O: MapOpener> LogStorage<O> {
    /// Open a storage using the process-wide registry and the local disk
    pub fn open(config: StorageConfig, opener: O) -> Result<Self> {
        Self::open_with_registry(config, opener, MapRegistry::global(), &LocalFileSystem)
    }

    /// Open a storage with an explicit registry and file system
    ///
    /// On startup:
    /// 1. Recover the name → id table from the storage root (if configured)
    /// 2. Start the flush scheduler over `registry`
    pub fn open_with_registry(
        config: StorageConfig,
        opener: O,
        registry: Arc<MapRegistry>,
        fs: &dyn FileSystem,
    ) -> Result<Self> {
        let (ids, recovery) = match config.storage_name() {
            Some(root) => {
                let (ids, recovery) = IdentityRecovery::recover(fs, root)?;
                tracing::info!(
                    "Recovered {} map ids from {} ({} temp maps deleted, {} entries skipped)",
                    ids.len(),
                    root.display(),
                    recovery.temp_maps_deleted,
                    recovery.entries_skipped
                );
                (ids, recovery)
            }
            None => (NameIdTable::new(), RecoveryResult::default()),
        };

        let scheduler = {
            let registry = Arc::clone(&registry);
            FlushScheduler::spawn(FlushScheduler::THREAD_NAME, config.flush_interval(), move || {
                let stats = registry.save_all();
                if stats.failed > 0 {
                    tracing::debug!(
                        "Flush cycle: {} saved, {} failed",
                        stats.saved,
                        stats.failed
                    );
                }
            })?
        };

        Ok(Self {
            owner: registry.next_owner_id(),
            config: Arc::new(config),
            opener,
            ids,
            recovery,
            registry,
            maps: RwLock::new(Vec::new()),
            next_temp_map_id: Mutex::new(0),
            lifecycle_lock: Mutex::new(()),
            scheduler,
            closed: AtomicBool::new(false),
        })
    }

    /// Open (or create) the map called `name`
    ///
    /// The map gets the id recovered for `name`, or `1` if the name was
    /// never seen. Distinct new names all get `1`: the id only tells apart
    /// generations of the same name.
    pub fn open_map(
        &self,
        name: &str,
        key_type: Option<DataType>,
        value_type: Option<DataType>,
    ) -> Result<Arc<O::Map>> {
        self.ensure_open()?;

        let descriptor = MapDescriptor {
            id: self.map_id(name),
            name: name.to_string(),
            key_type,
            value_type,
        };

        let map = Arc::new(self.opener.open(descriptor, &self.config)?);

        {
            // `close` flips `closed` under this same lock, so a map is either
            // registered before close drains the list or never registered.
            let mut maps = self.maps.write();
            if self.is_closed() {
                drop(maps);
                if let Err(e) = map.close() {
                    tracing::warn!("Failed to close map '{}' opened during close: {}", name, e);
                }
                return Err(LogError::Closed);
            }

            let weak = Arc::downgrade(&map);
            let weak: Weak<dyn StorageMap> = weak;
            self.registry.register(self.owner, weak);
            maps.push(Arc::clone(&map));
        }

        tracing::debug!("Opened map '{}' with id {}", name, map.id());
        Ok(map)
    }

    /// Create a temporary map named `temp-<n>`
    ///
    /// Temp maps use the default key/value encoding, are never added to the
    /// id table, and are deleted by the next startup's recovery.
    pub fn create_temp_map(&self) -> Result<Arc<O::Map>> {
        let mut next_id = self.next_temp_map_id.lock();
        self.ensure_open()?;
        *next_id += 1;
        let name = naming::temp_map_name(*next_id);
        self.open_map(&name, None, None)
    }

    /// Save every map opened through this instance
    ///
    /// Stops at the first failing save and returns its error.
    pub fn commit(&self) -> Result<()> {
        let _guard = self.lifecycle_lock.lock();
        self.ensure_open()?;

        let maps: Vec<Arc<O::Map>> = self.maps.read().clone();
        for map in &maps {
            map.save()?;
        }

        tracing::debug!("Committed {} maps", maps.len());
        Ok(())
    }

    /// Stop the scheduler, close every map, and clear all state
    ///
    /// Every map is closed even if some fail; the first failure is returned.
    /// The scheduler thread may keep running for up to one flush interval.
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let _guard = self.lifecycle_lock.lock();

        let maps = {
            let mut maps = self.maps.write();
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            std::mem::take(&mut *maps)
        };

        self.scheduler.stop();

        let mut first_error = None;
        for map in &maps {
            if let Err(e) = map.close() {
                tracing::error!("Failed to close map '{}' (id {}): {}", map.name(), map.id(), e);
                first_error.get_or_insert(e);
            }
        }

        self.registry.unregister_owner(self.owner);
        self.ids.clear();

        tracing::info!("Log storage closed ({} maps)", maps.len());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// The id `open_map(name, ..)` would use
    pub fn map_id(&self, name: &str) -> u32 {
        self.ids.get(name).unwrap_or(1)
    }

    /// Copy of the recovered name → id table
    pub fn recovered_ids(&self) -> HashMap<String, u32> {
        self.ids.snapshot()
    }

    /// Statistics of the startup recovery scan
    pub fn recovery_result(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Number of maps opened through this instance and not yet closed
    pub fn map_count(&self) -> usize {
        self.maps.read().len()
    }

    /// Number of temp map names handed out so far
    pub fn temp_map_count(&self) -> u32 {
        *self.next_temp_map_id.lock()
    }

    /// Number of this instance's entries in the registry
    pub fn registered_count(&self) -> usize {
        self.registry.owner_len(self.owner)
    }

    /// Registry this instance registers into
    pub fn registry(&self) -> &Arc<MapRegistry> {
        &self.registry
    }

    /// Get the configuration
    pub fn config(&self) -> &Arc<StorageConfig> {
        &self.config
    }

    /// Get the storage root, if one is configured
    pub fn storage_dir(&self) -> Option<&Path> {
        self.config.storage_name()
    }

    /// State of the background flush thread
    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LogError::Closed);
        }
        Ok(())
    }
}

impl<O: MapOpener> Drop for LogStorage<O> {
    fn drop(&mut self) {
        // Without close() the maps stay open; only stop scheduling them.
        self.registry.unregister_owner(self.owner);
    }
}
