//! File System Abstraction
//!
//! The few directory operations recovery needs, behind a trait so a storage
//! root can be backed by something other than the local disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Display name (last path component)
    pub name: String,

    /// Full path of the entry
    pub path: PathBuf,
}

/// Directory operations consumed by identity recovery
pub trait FileSystem: Send + Sync {
    /// Whether the path exists
    fn exists(&self, path: &Path) -> bool;

    /// Create a directory and all missing parents
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// List the entries of a directory
    fn list(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Delete a single entry (directories are removed with their contents)
    fn delete(&self, path: &Path) -> Result<()>;
}

/// `FileSystem` backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn list(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
            });
        }

        Ok(entries)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
