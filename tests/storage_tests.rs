//! Tests for LogStorage
//!
//! These tests verify:
//! - Map ids come from recovery, or 1 for unseen names
//! - Temporary map naming (sequential, unique under concurrency)
//! - Commit saves every map exactly once
//! - Close stops the scheduler, closes maps and clears all state
//! - Background saves through a registry shared between instances

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use atlaslog::fs::LocalFileSystem;
use atlaslog::{
    DataType, LogError, LogStorage, MapDescriptor, MapOpener, MapRegistry, Result, SchedulerState,
    StorageConfig, StorageMap,
};
use crossbeam::channel::{self, Receiver, Sender};
use common::{
    open_counting, open_counting_with_registry, setup_temp_storage, touch, wait_for, CountingOpener,
    QUIET_INTERVAL,
};

// =============================================================================
// Test Doubles
// =============================================================================

/// A map whose close is counted in a counter shared with its opener
struct GatedMap {
    descriptor: MapDescriptor,
    closes: Arc<AtomicUsize>,
}

impl StorageMap for GatedMap {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn id(&self) -> u32 {
        self.descriptor.id
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opener that parks inside `open` for the map named `gated`
///
/// Signals `entered` once it is inside, then waits on `release`.
struct GatedOpener {
    gated: &'static str,
    entered: Sender<()>,
    release: Receiver<()>,
    closes: Arc<AtomicUsize>,
}

impl MapOpener for GatedOpener {
    type Map = GatedMap;

    fn open(&self, descriptor: MapDescriptor, _config: &Arc<StorageConfig>) -> Result<GatedMap> {
        if descriptor.name == self.gated {
            self.entered.send(()).unwrap();
            self.release.recv().unwrap();
        }
        Ok(GatedMap {
            descriptor,
            closes: Arc::clone(&self.closes),
        })
    }
}

// =============================================================================
// Open / Recovery Tests
// =============================================================================

#[test]
fn test_open_creates_storage_root() {
    let (_temp, path) = setup_temp_storage();
    assert!(!path.exists());

    let storage = open_counting(&path, QUIET_INTERVAL);

    assert!(path.is_dir());
    assert!(storage.recovered_ids().is_empty());
    assert!(storage.recovery_result().created_root);
    assert_eq!(storage.storage_dir(), Some(path.as_path()));
    assert_eq!(storage.scheduler_state(), SchedulerState::Running);
}

#[test]
fn test_open_uses_recovered_ids() {
    let (_temp, path) = setup_temp_storage();
    touch(&path, "foo-3");
    touch(&path, "bar-7");

    let storage = open_counting(&path, QUIET_INTERVAL);

    assert_eq!(storage.open_map("foo", None, None).unwrap().id(), 3);
    assert_eq!(storage.open_map("bar", None, None).unwrap().id(), 7);
}

#[test]
fn test_unseen_names_get_id_one() {
    let (_temp, path) = setup_temp_storage();
    touch(&path, "foo-3");

    let storage = open_counting(&path, QUIET_INTERVAL);

    let a = storage.open_map("alpha", None, None).unwrap();
    let b = storage.open_map("beta", None, None).unwrap();

    assert_eq!(a.id(), 1);
    assert_eq!(b.id(), 1);
    assert_eq!(storage.map_id("gamma"), 1);
}

#[test]
fn test_open_map_passes_descriptor() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, QUIET_INTERVAL);

    let map = storage
        .open_map("typed", Some(DataType::String), Some(DataType::Long))
        .unwrap();

    assert_eq!(map.descriptor.name, "typed");
    assert_eq!(map.descriptor.key_type, Some(DataType::String));
    assert_eq!(map.descriptor.value_type, Some(DataType::Long));
    assert_eq!(storage.map_count(), 1);
    assert_eq!(storage.registered_count(), 1);
}

#[test]
fn test_open_deletes_leftover_temp_maps() {
    let (_temp, path) = setup_temp_storage();
    touch(&path, "temp-4");
    touch(&path, "foo-1");

    let storage = open_counting(&path, QUIET_INTERVAL);

    assert!(!path.join("temp-4").exists());
    assert!(!storage.recovered_ids().contains_key("temp"));
    assert_eq!(storage.recovery_result().temp_maps_deleted, 1);
}

#[test]
fn test_open_fails_on_corrupt_name() {
    let (_temp, path) = setup_temp_storage();
    touch(&path, "orders-abc");

    let config = StorageConfig::builder().storage_name(&path).build();
    let result = LogStorage::open_with_registry(
        config,
        CountingOpener,
        Arc::new(MapRegistry::new()),
        &LocalFileSystem,
    );

    assert!(matches!(result, Err(LogError::CorruptMapName { .. })));
}

#[test]
fn test_open_without_storage_name() {
    let config = StorageConfig::builder().flush_interval(QUIET_INTERVAL).build();
    let storage = LogStorage::open_with_registry(
        config,
        CountingOpener,
        Arc::new(MapRegistry::new()),
        &LocalFileSystem,
    )
    .unwrap();

    assert!(storage.recovered_ids().is_empty());
    assert_eq!(storage.open_map("m", None, None).unwrap().id(), 1);
    storage.close().unwrap();
}

// =============================================================================
// Temp Map Tests
// =============================================================================

#[test]
fn test_temp_maps_are_numbered_in_order() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, QUIET_INTERVAL);

    let names: Vec<String> = (0..3)
        .map(|_| storage.create_temp_map().unwrap().name().to_string())
        .collect();

    assert_eq!(names, vec!["temp-1", "temp-2", "temp-3"]);
}

#[test]
fn test_temp_maps_use_default_encoding() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, QUIET_INTERVAL);

    let map = storage.create_temp_map().unwrap();

    assert_eq!(map.id(), 1);
    assert_eq!(map.descriptor.key_type, None);
    assert_eq!(map.descriptor.value_type, None);
    assert!(storage.recovered_ids().is_empty());
}

#[test]
fn test_temp_map_names_unique_across_threads() {
    let (_temp, path) = setup_temp_storage();
    let storage = Arc::new(open_counting(&path, QUIET_INTERVAL));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                (0..10)
                    .map(|_| storage.create_temp_map().unwrap().name().to_string())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let names: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<&String> = names.iter().collect();

    assert_eq!(names.len(), 80);
    assert_eq!(unique.len(), 80);
    assert!(unique.contains(&"temp-1".to_string()));
    assert!(unique.contains(&"temp-80".to_string()));
}

#[test]
fn test_concurrent_open_map() {
    let (_temp, path) = setup_temp_storage();
    let storage = Arc::new(open_counting(&path, QUIET_INTERVAL));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                for i in 0..10 {
                    storage.open_map(&format!("m{}-{}", t, i), None, None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(storage.map_count(), 40);
    assert_eq!(storage.registered_count(), 40);
}

// =============================================================================
// Commit Tests
// =============================================================================

#[test]
fn test_commit_saves_every_map_once() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, QUIET_INTERVAL);

    let maps: Vec<_> = (0..5)
        .map(|i| storage.open_map(&format!("m{}", i), None, None).unwrap())
        .collect();
    let temp = storage.create_temp_map().unwrap();

    storage.commit().unwrap();

    assert!(maps.iter().all(|m| m.saves() == 1));
    assert_eq!(temp.saves(), 1);
}

#[test]
fn test_commit_propagates_save_failure() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, QUIET_INTERVAL);

    let map = storage.open_map("broken", None, None).unwrap();
    map.set_fail_saves(true);

    assert!(matches!(storage.commit(), Err(LogError::Io(_))));

    map.set_fail_saves(false);
    storage.commit().unwrap();
    assert_eq!(map.saves(), 1);
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_clears_everything() {
    let (_temp, path) = setup_temp_storage();
    touch(&path, "foo-3");
    let interval = Duration::from_millis(50);
    let registry = Arc::new(MapRegistry::new());
    let storage = open_counting_with_registry(&path, interval, Arc::clone(&registry));

    let foo = storage.open_map("foo", None, None).unwrap();
    let temp = storage.create_temp_map().unwrap();

    storage.close().unwrap();

    assert_eq!(foo.closes(), 1);
    assert_eq!(temp.closes(), 1);
    assert!(registry.is_empty());
    assert!(storage.recovered_ids().is_empty());
    assert_eq!(storage.map_count(), 0);
    assert!(storage.is_closed());

    assert!(wait_for(interval * 4, || {
        storage.scheduler_state() == SchedulerState::Stopped
    }));
}

#[test]
fn test_close_twice_is_noop() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, QUIET_INTERVAL);
    let map = storage.open_map("m", None, None).unwrap();

    storage.close().unwrap();
    storage.close().unwrap();

    assert_eq!(map.closes(), 1);
}

#[test]
fn test_close_reports_failure_after_cleanup() {
    let (_temp, path) = setup_temp_storage();
    let registry = Arc::new(MapRegistry::new());
    let storage = open_counting_with_registry(&path, QUIET_INTERVAL, Arc::clone(&registry));

    let bad = storage.open_map("bad", None, None).unwrap();
    let good = storage.open_map("good", None, None).unwrap();
    bad.set_fail_saves(true);

    assert!(storage.close().is_err());

    assert_eq!(good.closes(), 1);
    assert!(registry.is_empty());
    assert_eq!(storage.map_count(), 0);
}

#[test]
fn test_operations_after_close_fail() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, QUIET_INTERVAL);
    storage.close().unwrap();

    assert!(matches!(storage.open_map("m", None, None), Err(LogError::Closed)));
    assert!(matches!(storage.create_temp_map(), Err(LogError::Closed)));
    assert!(matches!(storage.commit(), Err(LogError::Closed)));
}

#[test]
fn test_temp_counter_untouched_after_close() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, QUIET_INTERVAL);
    storage.create_temp_map().unwrap();
    storage.close().unwrap();

    for _ in 0..3 {
        assert!(matches!(storage.create_temp_map(), Err(LogError::Closed)));
    }

    assert_eq!(storage.temp_map_count(), 1);
}

#[test]
fn test_open_racing_close_leaves_nothing_behind() {
    let (_temp, path) = setup_temp_storage();
    let (entered_tx, entered_rx) = channel::bounded(1);
    let (release_tx, release_rx) = channel::bounded(1);
    let closes = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(MapRegistry::new());

    let opener = GatedOpener {
        gated: "late",
        entered: entered_tx,
        release: release_rx,
        closes: Arc::clone(&closes),
    };
    let config = StorageConfig::builder()
        .storage_name(&path)
        .flush_interval(QUIET_INTERVAL)
        .build();
    let storage = Arc::new(
        LogStorage::open_with_registry(config, opener, Arc::clone(&registry), &LocalFileSystem)
            .unwrap(),
    );
    storage.open_map("early", None, None).unwrap();

    let opening = {
        let storage = Arc::clone(&storage);
        thread::spawn(move || storage.open_map("late", None, None).map(|_| ()))
    };

    // `late` has passed the closed check and is inside the opener
    entered_rx.recv().unwrap();
    storage.close().unwrap();
    release_tx.send(()).unwrap();

    let result = opening.join().unwrap();
    assert!(matches!(result, Err(LogError::Closed)));
    assert_eq!(storage.map_count(), 0);
    assert_eq!(storage.registered_count(), 0);
    assert!(registry.is_empty());
    // `early` closed by close(), `late` closed by the losing open_map
    assert_eq!(closes.load(Ordering::SeqCst), 2);
}

#[test]
fn test_drop_unregisters_maps() {
    let (_temp, path) = setup_temp_storage();
    let registry = Arc::new(MapRegistry::new());
    let storage = open_counting_with_registry(&path, QUIET_INTERVAL, Arc::clone(&registry));
    let _map = storage.open_map("m", None, None).unwrap();
    assert_eq!(registry.len(), 1);

    drop(storage);

    assert!(registry.is_empty());
}

// =============================================================================
// Background Flush Tests
// =============================================================================

#[test]
fn test_scheduler_saves_registered_maps() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, Duration::from_millis(10));

    let map = storage.open_map("m", None, None).unwrap();

    assert!(wait_for(Duration::from_secs(5), || map.saves() >= 2));
    storage.close().unwrap();
}

#[test]
fn test_scheduler_failures_are_not_surfaced() {
    let (_temp, path) = setup_temp_storage();
    let storage = open_counting(&path, Duration::from_millis(10));

    let bad = storage.open_map("bad", None, None).unwrap();
    let good = storage.open_map("good", None, None).unwrap();
    bad.set_fail_saves(true);

    assert!(wait_for(Duration::from_secs(5), || good.saves() >= 2));
    assert_eq!(bad.saves(), 0);
    assert!(storage.scheduler_state() == SchedulerState::Running);

    bad.set_fail_saves(false);
    storage.close().unwrap();
    assert_eq!(bad.closes(), 1);
}

#[test]
fn test_shared_registry_saves_other_instances_maps() {
    let (_temp_a, path_a) = setup_temp_storage();
    let (_temp_b, path_b) = setup_temp_storage();
    let registry = Arc::new(MapRegistry::new());

    // `quiet` never wakes; `busy` flushes everything in the shared registry
    let quiet = open_counting_with_registry(&path_a, QUIET_INTERVAL, Arc::clone(&registry));
    let busy =
        open_counting_with_registry(&path_b, Duration::from_millis(10), Arc::clone(&registry));

    let map = quiet.open_map("owned-by-quiet", None, None).unwrap();

    assert!(wait_for(Duration::from_secs(5), || map.saves() >= 1));

    busy.close().unwrap();
    quiet.close().unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_open_with_global_registry() {
    let (_temp, path) = setup_temp_storage();
    let config = StorageConfig::builder()
        .storage_name(&path)
        .flush_interval(QUIET_INTERVAL)
        .build();
    let storage = LogStorage::open(config, CountingOpener).unwrap();

    let map = storage.open_map("global", None, None).unwrap();
    assert!(Arc::ptr_eq(storage.registry(), &MapRegistry::global()));
    assert_eq!(storage.registered_count(), 1);

    storage.close().unwrap();
    assert_eq!(map.closes(), 1);
    assert_eq!(storage.registered_count(), 0);
}
