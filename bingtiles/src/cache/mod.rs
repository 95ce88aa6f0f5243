//! Tile caching
//!
//! Two layers sit between the mosaic assembler and the network:
//!
//! 1. **Memory**: decoded tiles in a size-bounded `moka` cache, owned by
//!    each [`CachedFetcher`]
//! 2. **Store**: encoded tile bytes in a [`TileStore`], either a directory
//!    of files or a single tar archive
//!
//! Entries are keyed by [`CacheKey`], derived from the resolved tile URL
//! only, so providers that resolve to the same URL share cached tiles.
//!
//! ```ignore
//! use bingtiles::cache::{CacheLocation, CachedFetcher, FetchMode, DEFAULT_MEMORY_BYTES};
//! use bingtiles::provider::{AsyncReqwestClient, ProviderRegistry};
//!
//! let location = CacheLocation::from_path(Some("tiles.tar".as_ref()));
//! let fetcher = CachedFetcher::open(location, AsyncReqwestClient::new()?, DEFAULT_MEMORY_BYTES)?;
//! let provider = ProviderRegistry::builtin().default_provider()?;
//! let tile = fetcher.fetch(&tile_coord, provider.as_ref(), FetchMode::Network).await?;
//! ```

mod error;
mod fetcher;
mod key;
mod location;
mod providers;
mod traits;

pub use error::TileError;
pub use fetcher::{CachedFetcher, FetchMode, FetchStats, DEFAULT_MEMORY_BYTES};
pub use key::{CacheKey, KeyError, MAX_KEY_LEN};
pub use location::{CacheLocation, OpenStore};
pub use providers::{ArchiveStore, DirectoryStore};
pub use traits::{BoxFuture, StoreError, TileStore};

/// Summary of a persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSummary {
    pub kind: &'static str,
    pub entries: u64,
}

/// Opens the store at `location` and counts its entries.
pub async fn cache_stats(location: &CacheLocation) -> Result<CacheSummary, StoreError> {
    let mut open = location.open()?;
    let summary = CacheSummary {
        kind: open.store.kind(),
        entries: open.store.entry_count().await?,
    };
    open.close()?;
    Ok(summary)
}
