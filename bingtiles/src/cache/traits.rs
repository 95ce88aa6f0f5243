//! Core traits for persistent tile stores.
//!
//! The `TileStore` trait is a write-once key-value interface over raw tile
//! bytes. Both backends (a directory of files and a single tar archive)
//! implement it, so the fetcher can use either through `Arc<dyn TileStore>`.
//!
//! # Design Principles
//!
//! - **Write-once**: a key's first stored value is never replaced
//! - **Raw bytes**: values are the encoded tile exactly as downloaded
//! - **No eviction**: stores only grow; clearing them is up to the user
//! - **Dyn-compatible**: uses `Pin<Box<dyn Future>>` for trait object support

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use super::key::CacheKey;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while reading or writing the backing storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive file is malformed or could not be indexed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Failed to join a blocking I/O task.
    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistent, write-once storage of encoded tiles.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` and tolerate concurrent calls,
/// including concurrent `put`s of the same key.
pub trait TileStore: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if an error occurs
    fn get(&self, key: &CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>>;

    /// Store a value under `key` unless the key already exists.
    ///
    /// Returns `true` if this call wrote the value, `false` if an entry was
    /// already present (the existing entry is left untouched).
    fn put(&self, key: &CacheKey, value: Vec<u8>) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// Check if a key exists without reading its value.
    fn contains(&self, key: &CacheKey) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// Number of stored entries.
    fn entry_count(&self) -> BoxFuture<'_, Result<u64, StoreError>>;

    /// Human-readable backend name for logs.
    fn kind(&self) -> &'static str;
}
