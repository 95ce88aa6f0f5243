//! Directory-backed tile store.
//!
//! One file per key, named by the key's encoded form. Writes go to a
//! temporary file in the same directory and are committed with a no-clobber
//! rename, so a reader never sees a partial tile and concurrent writers of
//! the same key cannot corrupt each other: the first rename wins and later
//! ones are discarded.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::cache::key::CacheKey;
use crate::cache::traits::{BoxFuture, StoreError, TileStore};

/// Tile store keeping one file per tile in a flat directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!(path = %dir.display(), "Opened directory tile store");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

fn write_noclobber(dir: &Path, path: &Path, value: &[u8]) -> Result<bool, StoreError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(value)?;
    tmp.flush()?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        // Another writer committed first; its bytes are equivalent
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(StoreError::Io(e.error)),
    }
}

impl TileStore for DirectoryStore {
    fn get(&self, key: &CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            blocking(move || match std::fs::read(&path) {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            })
            .await
        })
    }

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> BoxFuture<'_, Result<bool, StoreError>> {
        let path = self.entry_path(key);
        let dir = self.dir.clone();
        Box::pin(async move {
            let written = blocking(move || {
                if path.exists() {
                    return Ok(false);
                }
                write_noclobber(&dir, &path, &value)
            })
            .await?;
            trace!(written, "Directory store put");
            Ok(written)
        })
    }

    fn contains(&self, key: &CacheKey) -> BoxFuture<'_, Result<bool, StoreError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            blocking(move || Ok(path.try_exists()?)).await
        })
    }

    fn entry_count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        let dir = self.dir.clone();
        Box::pin(async move {
            blocking(move || {
                let mut count = 0;
                for entry in std::fs::read_dir(&dir)? {
                    let entry = entry?;
                    let is_key = entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| CacheKey::from_encoded(name).is_some());
                    if is_key && entry.file_type()?.is_file() {
                        count += 1;
                    }
                }
                Ok(count)
            })
            .await
        })
    }

    fn kind(&self) -> &'static str {
        "directory"
    }
}
