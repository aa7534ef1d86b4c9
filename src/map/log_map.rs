//! File-backed LogMap
//!
//! An ordered byte map kept in memory and written out as a single snapshot
//! file on every save.
//!
//! ## Layout
//! ```text
//! {storage_root}/
//!   └── {name}-{id}/
//!         ├── data        (last saved snapshot)
//!         └── data.tmp    (in-flight save, renamed over `data`)
//! ```
//!
//! ## Snapshot Format
//! ```text
//! ┌──────────┬────────────┬──────────┬───────────────┬─────────────────┐
//! │Magic (4) │Version (2) │ CRC (4)  │ Payload len(4)│ bincode payload │
//! └──────────┴────────────┴──────────┴───────────────┴─────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use crate::error::{LogError, Result};

use super::{DataType, MapDescriptor, MapOpener, StorageMap};

const MAGIC: &[u8; 4] = b"ALOG";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 14;

const DATA_FILENAME: &str = "data";
const TMP_FILENAME: &str = "data.tmp";

/// Serialized body of a snapshot
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

/// A persistent ordered map of byte keys to byte values
pub struct LogMap {
    descriptor: MapDescriptor,

    /// `{storage_root}/{name}-{id}`
    dir: PathBuf,

    /// Live contents
    data: RwLock<BTreeMap<Bytes, Bytes>>,

    /// Bumped on every mutation, under the `data` write lock
    version: AtomicU64,

    /// Version captured by the last snapshot that reached disk
    saved_version: AtomicU64,

    closed: AtomicBool,

    /// Scheduler and commit may both save the same map
    save_lock: Mutex<()>,
}

impl LogMap {
    /// Open the map under `root`, loading the last snapshot if there is one
    pub fn open(root: &Path, descriptor: MapDescriptor) -> Result<Self> {
        let dir = root.join(descriptor.full_name());
        fs::create_dir_all(&dir)?;

        let data_path = dir.join(DATA_FILENAME);
        let data = if data_path.exists() {
            let raw = fs::read(&data_path)?;
            decode_snapshot(&raw)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!(
            "Opened map {} ({} entries)",
            descriptor.full_name(),
            data.len()
        );

        Ok(Self {
            descriptor,
            dir,
            data: RwLock::new(data),
            version: AtomicU64::new(0),
            saved_version: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            save_lock: Mutex::new(()),
        })
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.data.read().get(key).cloned()
    }

    /// Insert or replace a value, returning the previous one
    pub fn put(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<Option<Bytes>> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let old = data.insert(key.into(), value.into());
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(old)
    }

    /// Remove a key, returning its value
    pub fn remove(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let old = data.remove(key);
        if old.is_some() {
            self.version.fetch_add(1, Ordering::AcqRel);
        }
        Ok(old)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Whether there are changes not yet on disk
    ///
    /// Stays `true` while a save is in flight.
    pub fn is_dirty(&self) -> bool {
        self.version.load(Ordering::Acquire) != self.saved_version.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn key_type(&self) -> Option<&DataType> {
        self.descriptor.key_type.as_ref()
    }

    pub fn value_type(&self) -> Option<&DataType> {
        self.descriptor.value_type.as_ref()
    }

    /// Directory holding this map's files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LogError::MapClosed(self.descriptor.full_name()));
        }
        Ok(())
    }

    /// Write `record` to `data.tmp`, then rename over `data`
    fn write_snapshot(&self, record: &SnapshotRecord) -> Result<()> {
        let encoded = encode_snapshot(record)?;

        let tmp_path = self.dir.join(TMP_FILENAME);
        let mut file = File::create(&tmp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;

        fs::rename(&tmp_path, self.dir.join(DATA_FILENAME))?;
        Ok(())
    }
}

impl StorageMap for LogMap {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn id(&self) -> u32 {
        self.descriptor.id
    }

    fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock();

        // Capture contents and version together; writes landing after this
        // bump `version` again and keep the map dirty.
        let (version, record) = {
            let data = self.data.read();
            let version = self.version.load(Ordering::Acquire);
            if version == self.saved_version.load(Ordering::Acquire) {
                return Ok(());
            }
            let entries = data.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect();
            (version, SnapshotRecord { entries })
        };

        self.write_snapshot(&record)?;
        self.saved_version.store(version, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.save()?;
        self.closed.store(true, Ordering::Release);
        tracing::debug!("Closed map {}", self.descriptor.full_name());
        Ok(())
    }
}

/// Opens `LogMap`s under the configured storage root
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMapOpener;

impl MapOpener for LogMapOpener {
    type Map = LogMap;

    fn open(&self, descriptor: MapDescriptor, config: &Arc<StorageConfig>) -> Result<LogMap> {
        let root = config.storage_name().ok_or_else(|| {
            LogError::Config(format!("'{}' is not set", StorageConfig::STORAGE_NAME))
        })?;
        LogMap::open(root, descriptor)
    }
}

// =============================================================================
// Snapshot Encoding
// =============================================================================

fn encode_snapshot(record: &SnapshotRecord) -> Result<Vec<u8>> {
    let payload = bincode::serialize(record)?;
    let crc = crc32fast::hash(&payload);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn decode_snapshot(raw: &[u8]) -> Result<BTreeMap<Bytes, Bytes>> {
    if raw.len() < HEADER_SIZE {
        return Err(LogError::Corruption(format!(
            "snapshot too short: {} bytes",
            raw.len()
        )));
    }

    if &raw[0..4] != MAGIC {
        return Err(LogError::Corruption(format!(
            "invalid snapshot magic: expected ALOG, got {:?}",
            &raw[0..4]
        )));
    }

    let version = u16::from_le_bytes([raw[4], raw[5]]);
    if version != VERSION {
        return Err(LogError::Corruption(format!(
            "unsupported snapshot version: {}",
            version
        )));
    }

    let crc = u32::from_le_bytes([raw[6], raw[7], raw[8], raw[9]]);
    let len = u32::from_le_bytes([raw[10], raw[11], raw[12], raw[13]]) as usize;

    let payload = &raw[HEADER_SIZE..];
    if payload.len() != len {
        return Err(LogError::Corruption(format!(
            "snapshot payload length mismatch: header says {}, found {}",
            len,
            payload.len()
        )));
    }

    if crc32fast::hash(payload) != crc {
        return Err(LogError::Corruption("snapshot CRC mismatch".to_string()));
    }

    let record: SnapshotRecord = bincode::deserialize(payload)?;
    Ok(record
        .entries
        .into_iter()
        .map(|(k, v)| (Bytes::from(k), Bytes::from(v)))
        .collect())
}
