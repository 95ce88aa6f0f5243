//! Single-file tar archive tile store.
//!
//! Each tile is one regular member named by its key's encoded form. The
//! archive is indexed once on open (member name to data offset and length);
//! reads then seek straight to the data. New members are appended after the
//! last one and the end-of-archive trailer is rewritten, so the file stays
//! a valid tar readable by standard tools after every `put`.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tar::{Archive, Builder, EntryType, Header};
use tracing::{debug, trace};

use crate::cache::key::CacheKey;
use crate::cache::traits::{BoxFuture, StoreError, TileStore};

/// Size of a tar block.
const BLOCK: u64 = 512;

/// Two zero blocks terminate an archive.
const TRAILER_LEN: u64 = 2 * BLOCK;

#[derive(Debug, Clone, Copy)]
struct MemberRange {
    offset: u64,
    length: u64,
}

#[derive(Debug)]
struct ArchiveState {
    index: HashMap<CacheKey, MemberRange>,
    /// End of the last member's padded data; appends start here.
    data_end: u64,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    state: Mutex<ArchiveState>,
}

/// Tile store backed by a single tar file.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    inner: Arc<Inner>,
}

fn padded(len: u64) -> u64 {
    len.div_ceil(BLOCK) * BLOCK
}

fn archive_err(path: &Path, e: impl std::fmt::Display) -> StoreError {
    StoreError::Archive(format!("{}: {}", path.display(), e))
}

impl ArchiveStore {
    /// Opens `path`, indexing existing members, or creates an empty archive.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            Self::index(&path)?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(&path)?;
            file.set_len(TRAILER_LEN)?;
            ArchiveState {
                index: HashMap::new(),
                data_end: 0,
            }
        };
        debug!(
            path = %path.display(),
            entries = state.index.len(),
            "Opened archive tile store"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                state: Mutex::new(state),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn index(path: &Path) -> Result<ArchiveState, StoreError> {
        let file = File::open(path)?;
        let mut archive = Archive::new(file);
        let mut index = HashMap::new();
        let mut data_end = 0;

        for entry in archive.entries().map_err(|e| archive_err(path, e))? {
            let entry = entry.map_err(|e| archive_err(path, e))?;
            let length = entry.size();
            let offset = entry.raw_file_position();
            data_end = data_end.max(offset + padded(length));

            if entry.header().entry_type() != EntryType::Regular {
                continue;
            }
            let name = entry.path_bytes();
            let key = std::str::from_utf8(&name)
                .ok()
                .and_then(CacheKey::from_encoded);
            match key {
                // First member wins, matching write-once semantics
                Some(key) => {
                    index.entry(key).or_insert(MemberRange { offset, length });
                }
                None => trace!(
                    member = %String::from_utf8_lossy(&name),
                    "Skipping foreign archive member"
                ),
            }
        }
        Ok(ArchiveState { index, data_end })
    }

    fn read_member(path: &Path, range: MemberRange) -> Result<Vec<u8>, StoreError> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(range.offset))?;
        let mut data = vec![0; range.length as usize];
        file.read_exact(&mut data)?;
        Ok(data)
    }

    fn append(inner: &Inner, key: &CacheKey, value: &[u8]) -> Result<bool, StoreError> {
        let mut state = inner.state.lock();
        if state.index.contains_key(key) {
            return Ok(false);
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&inner.path)?;
        file.seek(SeekFrom::Start(state.data_end))?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(value.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );

        let mut builder = Builder::new(file);
        builder.append_data(&mut header, key.as_str(), value)?;
        let mut file = builder.into_inner()?;

        let end = file.stream_position()?;
        file.set_len(end)?;

        let data_end = end - TRAILER_LEN;
        let length = value.len() as u64;
        state.index.insert(
            key.clone(),
            MemberRange {
                offset: data_end - padded(length),
                length,
            },
        );
        state.data_end = data_end;
        Ok(true)
    }
}

impl TileStore for ArchiveStore {
    fn get(&self, key: &CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
        let range = self.inner.state.lock().index.get(key).copied();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let Some(range) = range else {
                return Ok(None);
            };
            tokio::task::spawn_blocking(move || Self::read_member(&inner.path, range).map(Some))
                .await
                .map_err(|e| StoreError::Task(e.to_string()))?
        })
    }

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> BoxFuture<'_, Result<bool, StoreError>> {
        let inner = Arc::clone(&self.inner);
        let key = key.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || Self::append(&inner, &key, &value))
                .await
                .map_err(|e| StoreError::Task(e.to_string()))?
        })
    }

    fn contains(&self, key: &CacheKey) -> BoxFuture<'_, Result<bool, StoreError>> {
        let found = self.inner.state.lock().index.contains_key(key);
        Box::pin(async move { Ok(found) })
    }

    fn entry_count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        let count = self.inner.state.lock().index.len() as u64;
        Box::pin(async move { Ok(count) })
    }

    fn kind(&self) -> &'static str {
        "archive"
    }
}
