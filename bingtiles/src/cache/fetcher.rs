//! Deduplicating tile fetcher.
//!
//! Lookup order for a tile: in-memory memo, persistent store, network.
//! A tile is downloaded at most once per store; concurrent requests for the
//! same tile share one download.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use moka::future::Cache as MokaCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::error::TileError;
use super::key::CacheKey;
use super::location::{CacheLocation, OpenStore};
use super::traits::{StoreError, TileStore};
use crate::coord::{Quadkey, TileCoord};
use crate::provider::{AsyncHttpClient, TileProvider};

/// Default budget for decoded tiles kept in memory (256 MB).
pub const DEFAULT_MEMORY_BYTES: u64 = 256 * 1024 * 1024;

/// Whether a cache miss may go to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Download tiles that are not cached.
    #[default]
    Network,
    /// Report missing tiles as absent without any network access.
    CachedOnly,
}

/// Snapshot of fetcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Served from the in-memory memo.
    pub memory_hits: u64,
    /// Read from the persistent store.
    pub store_hits: u64,
    /// Downloaded from the provider.
    pub downloads: u64,
    /// Absent in cached-only mode.
    pub cached_misses: u64,
}

impl fmt::Display for FetchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} memory hits, {} cache hits, {} downloads, {} missing",
            self.memory_hits, self.store_hits, self.downloads, self.cached_misses
        )
    }
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    store_hits: AtomicU64,
    downloads: AtomicU64,
    cached_misses: AtomicU64,
}

fn decode(tile: TileCoord, url: &str, bytes: &[u8]) -> Result<DynamicImage, TileError> {
    image::load_from_memory(bytes).map_err(|e| TileError::Decode {
        tile,
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Fetches decoded tiles through a memory memo and a persistent store.
///
/// Bytes are decoded before they are persisted, so a response that is not
/// an image never enters the store.
pub struct CachedFetcher<C: AsyncHttpClient> {
    client: C,
    store: Arc<dyn TileStore>,
    open: Mutex<Option<OpenStore>>,
    location: Option<CacheLocation>,
    memo: MokaCache<CacheKey, Arc<DynamicImage>>,
    counters: Counters,
}

impl<C: AsyncHttpClient> CachedFetcher<C> {
    /// Opens the store at `location` and wraps `client`.
    ///
    /// # Arguments
    ///
    /// * `location` - Persistent store; [`CacheLocation::Temporary`] is
    ///   deleted again on [`close`](Self::close) or drop
    /// * `client` - HTTP transport used for cache misses
    /// * `memory_bytes` - Budget for decoded tiles held in memory
    pub fn open(
        location: CacheLocation,
        client: C,
        memory_bytes: u64,
    ) -> Result<Self, StoreError> {
        let open = location.open()?;
        let store = Arc::clone(&open.store);
        debug!(location = %location, store = store.kind(), "Tile fetcher ready");
        Ok(Self {
            client,
            store,
            open: Mutex::new(Some(open)),
            location: Some(location),
            memo: Self::build_memo(memory_bytes),
            counters: Counters::default(),
        })
    }

    /// Wraps an already opened store.
    pub fn with_store(store: Arc<dyn TileStore>, client: C, memory_bytes: u64) -> Self {
        Self {
            client,
            store,
            open: Mutex::new(None),
            location: None,
            memo: Self::build_memo(memory_bytes),
            counters: Counters::default(),
        }
    }

    fn build_memo(memory_bytes: u64) -> MokaCache<CacheKey, Arc<DynamicImage>> {
        MokaCache::builder()
            // Weight each entry by its decoded pixel data
            .weigher(|_key: &CacheKey, image: &Arc<DynamicImage>| -> u32 {
                image.as_bytes().len().min(u32::MAX as usize) as u32
            })
            .max_capacity(memory_bytes)
            .build()
    }

    pub fn store(&self) -> &Arc<dyn TileStore> {
        &self.store
    }

    pub fn location(&self) -> Option<&CacheLocation> {
        self.location.as_ref()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Retrieves one tile.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(image))` when the tile is memoised, stored or downloaded
    /// - `Ok(None)` only in [`FetchMode::CachedOnly`] when the tile is not
    ///   stored; no network request is made
    /// - `Err(_)` if URL resolution, download, decoding or storage fails
    pub async fn fetch(
        &self,
        tile: &TileCoord,
        provider: &dyn TileProvider,
        mode: FetchMode,
    ) -> Result<Option<Arc<DynamicImage>>, TileError> {
        let tile = *tile;
        let url = provider
            .tile_url(&tile)
            .map_err(|source| TileError::Provider { tile, source })?;
        let key = CacheKey::from_url(&url).map_err(|e| TileError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        if let Some(image) = self.memo.get(&key).await {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            trace!(tile = %tile, "Tile memo hit");
            return Ok(Some(image));
        }

        match mode {
            FetchMode::CachedOnly => {
                let Some(bytes) = self.store.get(&key).await? else {
                    self.counters.cached_misses.fetch_add(1, Ordering::Relaxed);
                    trace!(tile = %tile, "Tile not cached");
                    return Ok(None);
                };
                self.counters.store_hits.fetch_add(1, Ordering::Relaxed);
                let image = Arc::new(decode(tile, &url, &bytes)?);
                self.memo.insert(key, Arc::clone(&image)).await;
                Ok(Some(image))
            }
            FetchMode::Network => {
                let image = self
                    .memo
                    .try_get_with(key.clone(), self.load(tile, &url, &key))
                    .await
                    .map_err(|e| (*e).clone())?;
                Ok(Some(image))
            }
        }
    }

    /// Retrieves the tile addressed by a quadkey.
    pub async fn fetch_quadkey(
        &self,
        quadkey: &Quadkey,
        provider: &dyn TileProvider,
        mode: FetchMode,
    ) -> Result<Option<Arc<DynamicImage>>, TileError> {
        self.fetch(&quadkey.to_tile(), provider, mode).await
    }

    async fn load(
        &self,
        tile: TileCoord,
        url: &str,
        key: &CacheKey,
    ) -> Result<Arc<DynamicImage>, TileError> {
        if let Some(bytes) = self.store.get(key).await? {
            self.counters.store_hits.fetch_add(1, Ordering::Relaxed);
            debug!(tile = %tile, "Tile cache hit");
            return decode(tile, url, &bytes).map(Arc::new);
        }

        self.counters.downloads.fetch_add(1, Ordering::Relaxed);
        debug!(tile = %tile, url = url, "Downloading tile");
        let bytes = self
            .client
            .get(url)
            .await
            .map_err(|source| TileError::Fetch {
                tile,
                url: url.to_string(),
                source,
            })?;

        let image = decode(tile, url, &bytes)?;
        self.store.put(key, bytes).await?;
        Ok(Arc::new(image))
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            store_hits: self.counters.store_hits.load(Ordering::Relaxed),
            downloads: self.counters.downloads.load(Ordering::Relaxed),
            cached_misses: self.counters.cached_misses.load(Ordering::Relaxed),
        }
    }

    /// Releases the memo and deletes a temporary store.
    ///
    /// Persistent stores are left on disk. Fetching after `close` fails for
    /// temporary stores.
    pub fn close(&self) -> Result<(), StoreError> {
        self.memo.invalidate_all();
        if let Some(mut open) = self.open.lock().take() {
            open.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockAsyncHttpClient, PatternTileServer, ProviderError, XyzProvider};
    use tempfile::TempDir;

    fn provider() -> XyzProvider {
        XyzProvider::new("test", "http://tiles.test/{z}/{x}/{y}.png")
    }

    fn fetcher_in(dir: &TempDir, server: PatternTileServer) -> CachedFetcher<PatternTileServer> {
        let location = CacheLocation::Directory(dir.path().to_path_buf());
        CachedFetcher::open(location, server, DEFAULT_MEMORY_BYTES).unwrap()
    }

    #[tokio::test]
    async fn test_second_fetch_uses_cache() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp, PatternTileServer::default());
        let tile = TileCoord::new(1, 2, 3);

        let first = fetcher.fetch(&tile, &provider(), FetchMode::Network).await.unwrap().unwrap();
        let second = fetcher.fetch(&tile, &provider(), FetchMode::Network).await.unwrap().unwrap();

        assert_eq!(fetcher.client.request_count(), 1);
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(fetcher.stats().downloads, 1);
        assert_eq!(fetcher.stats().memory_hits, 1);
    }

    #[tokio::test]
    async fn test_persisted_tile_served_without_network() {
        let temp = TempDir::new().unwrap();
        let tile = TileCoord::new(4, 5, 6);
        {
            let fetcher = fetcher_in(&temp, PatternTileServer::default());
            fetcher.fetch(&tile, &provider(), FetchMode::Network).await.unwrap();
        }

        let fetcher = fetcher_in(&temp, PatternTileServer::default());
        let image = fetcher.fetch(&tile, &provider(), FetchMode::CachedOnly).await.unwrap();
        assert!(image.is_some());
        assert_eq!(fetcher.client.request_count(), 0);
        assert_eq!(fetcher.stats().store_hits, 1);
    }

    #[tokio::test]
    async fn test_cached_only_miss_makes_no_request() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp, PatternTileServer::default());

        let result = fetcher
            .fetch(&TileCoord::new(0, 0, 2), &provider(), FetchMode::CachedOnly)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(fetcher.client.request_count(), 0);
        assert_eq!(fetcher.stats().cached_misses, 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_coalesce() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(fetcher_in(&temp, PatternTileServer::default()));
        let provider = Arc::new(provider());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let fetcher = Arc::clone(&fetcher);
            let provider = Arc::clone(&provider);
            handles.push(tokio::spawn(async move {
                fetcher
                    .fetch(&TileCoord::new(3, 3, 4), provider.as_ref(), FetchMode::Network)
                    .await
                    .unwrap()
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(fetcher.client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_shared_url_shares_entry() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp, PatternTileServer::default());
        let a = XyzProvider::new("a", "http://tiles.test/{z}/{x}/{y}.png");
        let b = XyzProvider::new("b", "http://tiles.test/{z}/{x}/{y}.png");
        let tile = TileCoord::new(2, 2, 3);

        fetcher.fetch(&tile, &a, FetchMode::Network).await.unwrap();
        fetcher.fetch(&tile, &b, FetchMode::Network).await.unwrap();
        assert_eq!(fetcher.client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_tile_and_url() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp, PatternTileServer::failing_on("/3/1/1.png"));

        let err = fetcher
            .fetch(&TileCoord::new(1, 1, 3), &provider(), FetchMode::Network)
            .await
            .unwrap_err();
        match err {
            TileError::Fetch { tile, url, .. } => {
                assert_eq!(tile, TileCoord::new(1, 1, 3));
                assert_eq!(url, "http://tiles.test/3/1/1.png");
            }
            other => panic!("Expected Fetch error, got {:?}", other),
        }
        assert_eq!(fetcher.store().entry_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_response_not_persisted() {
        let temp = TempDir::new().unwrap();
        let location = CacheLocation::Directory(temp.path().to_path_buf());
        let client = MockAsyncHttpClient {
            response: Ok(b"<html>rate limited</html>".to_vec()),
        };
        let fetcher = CachedFetcher::open(location, client, DEFAULT_MEMORY_BYTES).unwrap();

        let err = fetcher
            .fetch(&TileCoord::new(0, 0, 1), &provider(), FetchMode::Network)
            .await
            .unwrap_err();
        assert!(matches!(err, TileError::Decode { .. }));
        assert_eq!(fetcher.store().entry_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp, PatternTileServer::default());
        let limited = provider().with_zoom_range(1, 5);

        let err = fetcher
            .fetch(&TileCoord::new(0, 0, 9), &limited, FetchMode::Network)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TileError::Provider {
                source: ProviderError::UnsupportedZoom(9),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_overlong_url_rejected_by_every_backend() {
        let temp = TempDir::new().unwrap();
        let template = format!("http://tiles.test/{}/{{z}}/{{x}}/{{y}}.png", "x".repeat(300));
        let long = XyzProvider::new("long", &template);
        let locations = [
            CacheLocation::Directory(temp.path().join("dir")),
            CacheLocation::Archive(temp.path().join("tiles.tar")),
        ];

        for location in locations {
            let fetcher =
                CachedFetcher::open(location, PatternTileServer::default(), DEFAULT_MEMORY_BYTES)
                    .unwrap();
            let err = fetcher
                .fetch(&TileCoord::new(0, 0, 1), &long, FetchMode::Network)
                .await
                .unwrap_err();
            assert!(matches!(err, TileError::InvalidUrl { .. }));
            assert_eq!(fetcher.client.request_count(), 0);
            assert_eq!(fetcher.store().entry_count().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_fetch_quadkey() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp, PatternTileServer::default());
        let quadkey = Quadkey::parse("123").unwrap();

        fetcher.fetch_quadkey(&quadkey, &provider(), FetchMode::Network).await.unwrap();
        let seen = fetcher.client.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["http://tiles.test/3/5/3.png".to_string()]);
    }

    #[tokio::test]
    async fn test_close_removes_temporary_store() {
        let fetcher = CachedFetcher::open(
            CacheLocation::Temporary,
            PatternTileServer::default(),
            DEFAULT_MEMORY_BYTES,
        )
        .unwrap();
        fetcher
            .fetch(&TileCoord::new(0, 0, 1), &provider(), FetchMode::Network)
            .await
            .unwrap();

        let path = fetcher
            .open
            .lock()
            .as_ref()
            .and_then(|o| o.temp_path().map(|p| p.to_path_buf()))
            .unwrap();
        assert!(path.is_dir());
        fetcher.close().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_archive_backed_fetcher() {
        let temp = TempDir::new().unwrap();
        let location = CacheLocation::Archive(temp.path().join("tiles.tar"));
        let fetcher =
            CachedFetcher::open(location, PatternTileServer::default(), DEFAULT_MEMORY_BYTES)
                .unwrap();

        fetcher.fetch(&TileCoord::new(1, 0, 1), &provider(), FetchMode::Network).await.unwrap();
        assert_eq!(fetcher.store().entry_count().await.unwrap(), 1);
        assert_eq!(fetcher.store().kind(), "archive");
    }
}
