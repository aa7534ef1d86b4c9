//! Configuration for AtlasLog
//!
//! A string → string option map, shared read-only by every map opened from it.
//! Only a couple of keys are interpreted here; the rest are passed through to
//! the map implementation untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LogError, Result};

/// Configuration for a `LogStorage` instance
#[derive(Debug, Clone)]
pub struct StorageConfig {
    // -------------------------------------------------------------------------
    // Raw Options
    // -------------------------------------------------------------------------
    /// All options as given, including the ones interpreted below
    options: HashMap<String, String>,

    // -------------------------------------------------------------------------
    // Scheduler Configuration
    // -------------------------------------------------------------------------
    /// How long the background worker sleeps between flush cycles
    flush_interval: Duration,
}

impl StorageConfig {
    /// Storage root directory key
    pub const STORAGE_NAME: &'static str = "storageName";

    /// Flush interval key (milliseconds)
    pub const FLUSH_INTERVAL: &'static str = "flushInterval";

    /// Default flush interval of the background worker
    pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

    /// Create a new config builder
    pub fn builder() -> StorageConfigBuilder {
        StorageConfigBuilder::default()
    }

    /// Build a config from a raw option map
    ///
    /// `flushInterval` is parsed as milliseconds when present.
    pub fn from_options(options: HashMap<String, String>) -> Result<Self> {
        let flush_interval = match options.get(Self::FLUSH_INTERVAL) {
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|e| {
                    LogError::Config(format!("invalid {} '{}': {}", Self::FLUSH_INTERVAL, raw, e))
                })?;
                Duration::from_millis(ms)
            }
            None => Self::DEFAULT_FLUSH_INTERVAL,
        };

        Ok(Self {
            options,
            flush_interval,
        })
    }

    /// The storage root directory, if configured
    pub fn storage_name(&self) -> Option<&Path> {
        self.options.get(Self::STORAGE_NAME).map(Path::new)
    }

    /// Background flush interval
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Look up a raw option
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// All raw options
    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            options: HashMap::new(),
            flush_interval: Self::DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Builder for StorageConfig
#[derive(Default)]
pub struct StorageConfigBuilder {
    config: StorageConfig,
}

impl StorageConfigBuilder {
    /// Set the storage root directory
    pub fn storage_name(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.config.options.insert(
            StorageConfig::STORAGE_NAME.to_string(),
            path.to_string_lossy().into_owned(),
        );
        self
    }

    /// Set the background flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self.config.options.insert(
            StorageConfig::FLUSH_INTERVAL.to_string(),
            interval.as_millis().to_string(),
        );
        self
    }

    /// Set an arbitrary pass-through option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.options.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> StorageConfig {
        self.config
    }
}
