//! # AtlasLog
//!
//! Map registry and lifecycle manager for log-structured storage:
//! - Identity recovery of persistent maps from the storage directory
//! - Named and temporary map creation
//! - Periodic background flushing of every open map
//! - Synchronous commit and orderly close
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        LogStorage                            │
//! │        open_map / create_temp_map / commit / close           │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │ startup              │ register              │ start / stop
//!        ▼                      ▼                       ▼
//!  ┌─────────────┐      ┌───────────────┐      ┌────────────────┐
//!  │  Identity   │      │  MapRegistry  │◀─────│ FlushScheduler │
//!  │  Recovery   │      │ (shared, CoW) │ save │ (bg thread)    │
//!  └──────┬──────┘      └───────┬───────┘ all  └────────────────┘
//!         │                     │
//!         ▼                     ▼
//!  ┌─────────────┐      ┌───────────────┐
//!  │ NameIdTable │      │  StorageMap   │  (LogMap by default)
//!  └─────────────┘      └───────────────┘
//! ```
//!
//! On disk every map is `<name>-<id>` under the storage root; `temp-<n>`
//! entries are temporary maps and are deleted at startup.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod naming;
pub mod fs;
pub mod recovery;
pub mod map;
pub mod registry;
pub mod scheduler;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LogError, Result};
pub use config::StorageConfig;
pub use map::{DataType, LogMap, LogMapOpener, MapDescriptor, MapOpener, StorageMap};
pub use registry::MapRegistry;
pub use scheduler::{FlushScheduler, SchedulerState};
pub use storage::LogStorage;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasLog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
