//! Shared helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atlaslog::fs::LocalFileSystem;
use atlaslog::{LogError, LogStorage, MapDescriptor, MapOpener, MapRegistry, Result, StorageConfig, StorageMap};
use tempfile::TempDir;

// =============================================================================
// Test Doubles
// =============================================================================

/// A map that only counts how often it was saved and closed
pub struct CountingMap {
    pub descriptor: MapDescriptor,
    saves: AtomicUsize,
    closes: AtomicUsize,
    fail_saves: AtomicBool,
}

impl CountingMap {
    pub fn new(descriptor: MapDescriptor) -> Self {
        Self {
            descriptor,
            saves: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl StorageMap for CountingMap {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn id(&self) -> u32 {
        self.descriptor.id
    }

    fn save(&self) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(LogError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected save failure",
            )));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.save()?;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens `CountingMap`s
#[derive(Default)]
pub struct CountingOpener;

impl MapOpener for CountingOpener {
    type Map = CountingMap;

    fn open(&self, descriptor: MapDescriptor, _config: &Arc<StorageConfig>) -> Result<CountingMap> {
        Ok(CountingMap::new(descriptor))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Interval long enough that the scheduler never fires during a test
pub const QUIET_INTERVAL: Duration = Duration::from_secs(3600);

pub fn setup_temp_storage() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("storage");
    (temp_dir, path)
}

/// Create an empty file under `dir`
pub fn touch(dir: &Path, name: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), b"").unwrap();
}

/// Create an empty directory under `dir`
pub fn mkdir(dir: &Path, name: &str) {
    fs::create_dir_all(dir.join(name)).unwrap();
}

/// Open a storage with counting maps and a private registry
pub fn open_counting(path: &Path, interval: Duration) -> LogStorage<CountingOpener> {
    open_counting_with_registry(path, interval, Arc::new(MapRegistry::new()))
}

pub fn open_counting_with_registry(
    path: &Path,
    interval: Duration,
    registry: Arc<MapRegistry>,
) -> LogStorage<CountingOpener> {
    let config = StorageConfig::builder()
        .storage_name(path)
        .flush_interval(interval)
        .build();
    LogStorage::open_with_registry(config, CountingOpener, registry, &LocalFileSystem).unwrap()
}

/// Poll until `cond` holds or `timeout` elapses
pub fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
