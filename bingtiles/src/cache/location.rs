//! Resolution of a user-supplied cache path to a tile store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::debug;

use super::providers::{ArchiveStore, DirectoryStore};
use super::traits::{StoreError, TileStore};

/// Where persistent tiles live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLocation {
    /// A private directory that is deleted when the fetcher closes.
    Temporary,
    /// A directory, created if absent and never removed.
    Directory(PathBuf),
    /// A single `.tar` archive.
    Archive(PathBuf),
}

impl CacheLocation {
    /// Picks the backend for an optional path: none means temporary, a
    /// `.tar` extension means archive, anything else a directory.
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            None => CacheLocation::Temporary,
            Some(p) if p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("tar")) => {
                CacheLocation::Archive(p.to_path_buf())
            }
            Some(p) => CacheLocation::Directory(p.to_path_buf()),
        }
    }

    /// Opens the store. The returned [`OpenStore`] owns the temporary
    /// directory, if any.
    pub fn open(&self) -> Result<OpenStore, StoreError> {
        match self {
            CacheLocation::Temporary => {
                let temp = tempfile::Builder::new().prefix("bingtiles-").tempdir()?;
                debug!(path = %temp.path().display(), "Created temporary tile cache");
                let store = DirectoryStore::open(temp.path())?;
                Ok(OpenStore {
                    store: Arc::new(store),
                    temp: Some(temp),
                })
            }
            CacheLocation::Directory(dir) => Ok(OpenStore {
                store: Arc::new(DirectoryStore::open(dir)?),
                temp: None,
            }),
            CacheLocation::Archive(path) => Ok(OpenStore {
                store: Arc::new(ArchiveStore::open(path)?),
                temp: None,
            }),
        }
    }
}

impl fmt::Display for CacheLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheLocation::Temporary => write!(f, "temporary directory"),
            CacheLocation::Directory(p) => write!(f, "directory {}", p.display()),
            CacheLocation::Archive(p) => write!(f, "archive {}", p.display()),
        }
    }
}

/// An opened store plus the temporary directory backing it, if any.
///
/// Dropping this value removes the temporary directory.
pub struct OpenStore {
    pub store: Arc<dyn TileStore>,
    temp: Option<TempDir>,
}

impl OpenStore {
    /// Path of the temporary directory, if the store is temporary.
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_ref().map(|t| t.path())
    }

    /// Deletes the temporary directory now, reporting any failure.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if let Some(temp) = self.temp.take() {
            debug!(path = %temp.path().display(), "Removing temporary tile cache");
            temp.close()?;
        }
        Ok(())
    }
}
