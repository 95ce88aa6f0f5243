//! Concurrent mosaic assembly.
//!
//! The assembler fetches every tile of a [`MosaicGrid`] through a shared
//! [`CachedFetcher`], stitches them and crops the result. Fetching runs as
//! a bounded `JoinSet` fan-out (or a plain loop in sequential mode); either
//! way tiles are placed by grid index, so the output never depends on
//! completion order.

use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use moka::future::Cache as MokaCache;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CachedFetcher, FetchMode, TileError};
use crate::coord::TileCoord;
use crate::provider::{AsyncHttpClient, TileProvider};

use super::error::MosaicError;
use super::grid::{MosaicGrid, MosaicRequest};
use super::progress::{FetchProgress, NoProgress};
use super::stitch::{crop, stitch};

/// Default number of concurrent tile fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Default cap on tiles per mosaic; 4096 RGBA tiles stitch to 1 GiB.
pub const DEFAULT_MAX_TILES: u64 = 4096;

/// Default budget for memoised stitched mosaics (128 MB).
pub const DEFAULT_ROUGH_CACHE_BYTES: u64 = 128 * 1024 * 1024;

/// Mosaic assembly settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicConfig {
    /// Fetch tiles concurrently; `false` fetches one at a time in grid order.
    pub parallel: bool,
    /// Upper bound on in-flight fetches in parallel mode.
    pub max_concurrent: usize,
    /// Process the grid in batches of this many tiles, each finishing before
    /// the next starts. `None` treats the whole grid as one batch.
    pub batch_size: Option<usize>,
    /// Largest grid, in tiles, that is fetched and stitched.
    pub max_tiles: u64,
    /// Budget for memoised uncropped mosaics.
    pub rough_cache_bytes: u64,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            batch_size: None,
            max_tiles: DEFAULT_MAX_TILES,
            rough_cache_bytes: DEFAULT_ROUGH_CACHE_BYTES,
        }
    }
}

/// Identifies a stitched mosaic: the tile rectangle plus the key of its
/// corner tile, which pins down the provider's URL scheme.
type RoughKey = (TileCoord, TileCoord, CacheKey);

/// Fetched tiles in grid order; `None` marks a tile missing from the cache.
pub type GridTiles = Vec<Option<Arc<DynamicImage>>>;

/// Assembles bounding-box mosaics from tiles.
pub struct MosaicAssembler<C: AsyncHttpClient + 'static> {
    fetcher: Arc<CachedFetcher<C>>,
    config: MosaicConfig,
    rough: MokaCache<RoughKey, Arc<DynamicImage>>,
    progress: Arc<dyn FetchProgress>,
}

impl<C: AsyncHttpClient + 'static> MosaicAssembler<C> {
    pub fn new(fetcher: Arc<CachedFetcher<C>>, config: MosaicConfig) -> Self {
        let rough = MokaCache::builder()
            .weigher(|_key: &RoughKey, image: &Arc<DynamicImage>| -> u32 {
                image.as_bytes().len().min(u32::MAX as usize) as u32
            })
            .max_capacity(config.rough_cache_bytes)
            .build();
        Self {
            fetcher,
            config,
            rough,
            progress: Arc::new(NoProgress),
        }
    }

    /// Reports tile progress to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn FetchProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn fetcher(&self) -> &Arc<CachedFetcher<C>> {
        &self.fetcher
    }

    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    /// Rejects grids over [`MosaicConfig::max_tiles`].
    pub fn check_size(&self, grid: &MosaicGrid) -> Result<(), MosaicError> {
        let tiles = grid.tile_count();
        if tiles > self.config.max_tiles {
            return Err(MosaicError::TooLarge {
                tiles,
                limit: self.config.max_tiles,
            });
        }
        Ok(())
    }

    /// Builds the mosaic for `request`, downloading missing tiles.
    ///
    /// Fails with the first tile error; no partial mosaic is produced.
    pub async fn assemble(
        &self,
        request: &MosaicRequest,
        provider: Arc<dyn TileProvider>,
    ) -> Result<DynamicImage, MosaicError> {
        let grid = MosaicGrid::new(request)?;
        self.check_size(&grid)?;
        let key = self.rough_key(&grid, provider.as_ref())?;

        let rough = self
            .rough
            .try_get_with(key, async {
                let tiles = self.fetch_grid(&grid, Arc::clone(&provider), FetchMode::Network).await?;
                // Network mode never reports a missing tile
                let tiles: Vec<_> = tiles.into_iter().flatten().collect();
                stitch(&grid, &tiles).map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())?;

        Ok(crop(&grid, &rough))
    }

    /// Builds the mosaic only from cached tiles.
    ///
    /// Returns `Ok(None)` if any tile is missing; never touches the network.
    pub async fn assemble_cached(
        &self,
        request: &MosaicRequest,
        provider: Arc<dyn TileProvider>,
    ) -> Result<Option<DynamicImage>, MosaicError> {
        let grid = MosaicGrid::new(request)?;
        self.check_size(&grid)?;
        let key = self.rough_key(&grid, provider.as_ref())?;

        if let Some(rough) = self.rough.get(&key).await {
            return Ok(Some(crop(&grid, &rough)));
        }

        let tiles = self.fetch_grid(&grid, provider, FetchMode::CachedOnly).await?;
        let missing = tiles.iter().filter(|t| t.is_none()).count();
        if missing > 0 {
            debug!(missing, total = tiles.len(), "Mosaic not fully cached");
            return Ok(None);
        }

        let tiles: Vec<_> = tiles.into_iter().flatten().collect();
        let rough = Arc::new(stitch(&grid, &tiles)?);
        self.rough.insert(key, Arc::clone(&rough)).await;
        Ok(Some(crop(&grid, &rough)))
    }

    fn rough_key(&self, grid: &MosaicGrid, provider: &dyn TileProvider) -> Result<RoughKey, MosaicError> {
        let tile = grid.min;
        let url = provider
            .tile_url(&tile)
            .map_err(|source| TileError::Provider { tile, source })?;
        let key = CacheKey::from_url(&url).map_err(|e| TileError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok((grid.min, grid.max, key))
    }

    /// Fetches every tile of `grid`, returned in grid order.
    pub async fn fetch_grid(
        &self,
        grid: &MosaicGrid,
        provider: Arc<dyn TileProvider>,
        mode: FetchMode,
    ) -> Result<GridTiles, MosaicError> {
        self.check_size(grid)?;
        let tiles = grid.tiles();
        let total = tiles.len();
        let batch_size = self.config.batch_size.filter(|b| *b > 0).unwrap_or(total.max(1));
        let started = Instant::now();

        self.progress.on_start(total);
        let mut results: GridTiles = vec![None; total];
        let mut done = 0;

        let mut outcome = Ok(());
        for (batch, chunk) in tiles.chunks(batch_size).enumerate() {
            let offset = batch * batch_size;
            outcome = if self.config.parallel {
                self.fetch_parallel(chunk, offset, &provider, mode, &mut results, &mut done, total)
                    .await
            } else {
                self.fetch_sequential(chunk, offset, provider.as_ref(), mode, &mut results, &mut done, total)
                    .await
            };
            if outcome.is_err() {
                break;
            }
        }
        self.progress.on_finish();
        outcome?;

        info!(
            tiles = total,
            zoom = grid.zoom,
            parallel = self.config.parallel,
            elapsed_ms = started.elapsed().as_millis() as u64,
            stats = %self.fetcher.stats(),
            "Fetched mosaic tiles"
        );
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_sequential(
        &self,
        chunk: &[TileCoord],
        offset: usize,
        provider: &dyn TileProvider,
        mode: FetchMode,
        results: &mut GridTiles,
        done: &mut usize,
        total: usize,
    ) -> Result<(), MosaicError> {
        for (i, tile) in chunk.iter().enumerate() {
            results[offset + i] = self.fetcher.fetch(tile, provider, mode).await?;
            *done += 1;
            self.progress.on_tile(*done, total);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_parallel(
        &self,
        chunk: &[TileCoord],
        offset: usize,
        provider: &Arc<dyn TileProvider>,
        mode: FetchMode,
        results: &mut GridTiles,
        done: &mut usize,
        total: usize,
    ) -> Result<(), MosaicError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for (i, tile) in chunk.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let provider = Arc::clone(provider);
            let semaphore = Arc::clone(&semaphore);
            let tile = *tile;
            let index = offset + i;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| MosaicError::TaskFailed(e.to_string()))?;
                let image = fetcher.fetch(&tile, provider.as_ref(), mode).await?;
                Ok::<_, MosaicError>((index, image))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| MosaicError::TaskFailed(e.to_string()))
                .and_then(|r| r);
            match outcome {
                Ok((index, image)) => {
                    results[index] = image;
                    *done += 1;
                    self.progress.on_tile(*done, total);
                }
                Err(e) => {
                    warn!(error = %e, "Tile fetch failed, cancelling remaining fetches");
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::GenericImageView;
    use tempfile::TempDir;

    use crate::cache::{CacheLocation, DEFAULT_MEMORY_BYTES};
    use crate::coord::{tile_to_geodetic, FractionalTile, GeoCoord};
    use crate::provider::{
        encode_png, pattern_tile, MockAsyncHttpClient, PatternTileServer, XyzProvider,
    };

    fn provider() -> Arc<dyn TileProvider> {
        Arc::new(XyzProvider::new("test", "http://tiles.test/{z}/{x}/{y}.png"))
    }

    fn request_at(x0: f64, y0: f64, x1: f64, y1: f64, zoom: u8) -> MosaicRequest {
        let a = tile_to_geodetic(&FractionalTile { x: x0, y: y0, zoom });
        let b = tile_to_geodetic(&FractionalTile { x: x1, y: y1, zoom });
        MosaicRequest::new(a, b, zoom).unwrap()
    }

    fn assembler<C: AsyncHttpClient + 'static>(
        dir: &TempDir,
        client: C,
        config: MosaicConfig,
    ) -> MosaicAssembler<C> {
        let location = CacheLocation::Directory(dir.path().to_path_buf());
        let fetcher = CachedFetcher::open(location, client, DEFAULT_MEMORY_BYTES).unwrap();
        MosaicAssembler::new(Arc::new(fetcher), config)
    }

    fn sequential() -> MosaicConfig {
        MosaicConfig {
            parallel: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_parallel_and_sequential_identical() {
        let request = request_at(1.3, 2.6, 4.2, 5.1, 4);

        let dir_a = TempDir::new().unwrap();
        let parallel = assembler(&dir_a, PatternTileServer::default(), MosaicConfig::default());
        let a = parallel.assemble(&request, provider()).await.unwrap();

        let dir_b = TempDir::new().unwrap();
        let serial = assembler(&dir_b, PatternTileServer::default(), sequential());
        let b = serial.assemble(&request, provider()).await.unwrap();

        assert_eq!(a.dimensions(), b.dimensions());
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_identical_on_multi_thread_runtime() {
        let request = request_at(0.0, 0.0, 4.0, 4.0, 3);
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let config = MosaicConfig {
            max_concurrent: 3,
            ..Default::default()
        };

        let a = assembler(&dir_a, PatternTileServer::default(), config)
            .assemble(&request, provider())
            .await
            .unwrap();
        let b = assembler(&dir_b, PatternTileServer::default(), sequential())
            .assemble(&request, provider())
            .await
            .unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[tokio::test]
    async fn test_aligned_box_is_raw_concatenation() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default());
        let image = asm
            .assemble(&request_at(1.0, 1.0, 3.0, 3.0, 3), provider())
            .await
            .unwrap()
            .to_rgb8();

        assert_eq!(image.dimensions(), (512, 512));
        for (tx, ty) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            let tile = pattern_tile(tx, ty);
            let (ox, oy) = ((tx - 1) * 256, (ty - 1) * 256);
            for (px, py) in [(0, 0), (255, 0), (0, 255), (99, 177)] {
                assert_eq!(image.get_pixel(ox + px, oy + py), tile.get_pixel(px, py));
            }
        }
        assert_eq!(asm.fetcher().client().request_count(), 4);
    }

    #[tokio::test]
    async fn test_cached_only_on_empty_cache() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default());
        let request = request_at(1.0, 1.0, 3.0, 3.0, 3);
        let grid = MosaicGrid::new(&request).unwrap();

        let tiles = asm.fetch_grid(&grid, provider(), FetchMode::CachedOnly).await.unwrap();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| t.is_none()));

        assert!(asm.assemble_cached(&request, provider()).await.unwrap().is_none());
        assert_eq!(asm.fetcher().client().request_count(), 0);
    }

    #[tokio::test]
    async fn test_cached_lookup_after_download() {
        let dir = TempDir::new().unwrap();
        let request = request_at(1.5, 1.5, 2.5, 2.5, 3);
        let built = {
            let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default());
            asm.assemble(&request, provider()).await.unwrap()
        };

        let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default());
        let cached = asm.assemble_cached(&request, provider()).await.unwrap().unwrap();
        assert_eq!(cached.as_bytes(), built.as_bytes());
        assert_eq!(asm.fetcher().client().request_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_fails_whole_mosaic() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(
            &dir,
            PatternTileServer::failing_on("/3/2/2.png"),
            MosaicConfig::default(),
        );

        let err = asm
            .assemble(&request_at(1.0, 1.0, 3.0, 3.0, 3), provider())
            .await
            .unwrap_err();
        match err {
            MosaicError::Tile(TileError::Fetch { tile, url, .. }) => {
                assert_eq!(tile, TileCoord::new(2, 2, 3));
                assert_eq!(url, "http://tiles.test/3/2/2.png");
            }
            other => panic!("Expected fetch failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_sequential() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir, PatternTileServer::failing_on("/3/1/2.png"), sequential());

        let err = asm
            .assemble(&request_at(1.0, 1.0, 3.0, 3.0, 3), provider())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("http://tiles.test/3/1/2.png"));
        // Grid order is (1,1), (1,2): the loop stops at the failing tile
        assert_eq!(asm.fetcher().client().request_count(), 2);
    }

    #[tokio::test]
    async fn test_rough_mosaic_memoised() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default());
        let request = request_at(1.2, 1.2, 2.8, 2.8, 3);

        let first = asm.assemble(&request, provider()).await.unwrap();
        let stats = asm.fetcher().stats();
        let second = asm.assemble(&request, provider()).await.unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
        // Second call never reached the fetcher
        assert_eq!(asm.fetcher().stats(), stats);
    }

    #[tokio::test]
    async fn test_batches_match_single_pass() {
        let request = request_at(0.5, 0.5, 3.5, 3.5, 3);
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let batched = MosaicConfig {
            batch_size: Some(3),
            ..Default::default()
        };

        let a = assembler(&dir_a, PatternTileServer::default(), batched)
            .assemble(&request, provider())
            .await
            .unwrap();
        let b = assembler(&dir_b, PatternTileServer::default(), MosaicConfig::default())
            .assemble(&request, provider())
            .await
            .unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[derive(Default)]
    struct Recorder {
        started: AtomicUsize,
        ticks: AtomicUsize,
        last_done: AtomicUsize,
        finished: AtomicUsize,
    }

    impl FetchProgress for Recorder {
        fn on_start(&self, total: usize) {
            self.started.store(total, Ordering::SeqCst);
        }

        fn on_tile(&self, done: usize, _total: usize) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.last_done.store(done, Ordering::SeqCst);
        }

        fn on_finish(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_progress_callbacks() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default())
            .with_progress(Arc::clone(&recorder) as Arc<dyn FetchProgress>);

        asm.assemble(&request_at(1.0, 1.0, 4.0, 3.0, 3), provider())
            .await
            .unwrap();
        assert_eq!(recorder.started.load(Ordering::SeqCst), 6);
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 6);
        assert_eq!(recorder.last_done.load(Ordering::SeqCst), 6);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_tile_size_rejected() {
        let dir = TempDir::new().unwrap();
        let small = encode_png(DynamicImage::new_rgb8(64, 64));
        let client = MockAsyncHttpClient { response: Ok(small) };
        let asm = assembler(&dir, client, MosaicConfig::default());

        let err = asm
            .assemble(&request_at(1.0, 1.0, 2.0, 2.0, 3), provider())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MosaicError::TileSize {
                width: 64,
                height: 64,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_region() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default());
        let err = asm
            .assemble(&request_at(2.0, 2.0, 2.0, 3.0, 3), provider())
            .await
            .unwrap_err();
        assert!(matches!(err, MosaicError::EmptyRegion { .. }));
    }

    #[tokio::test]
    async fn test_world_at_deep_zoom_too_large() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default());
        let request = MosaicRequest::new(
            GeoCoord::new(85.0, -180.0),
            GeoCoord::new(-85.0, 180.0),
            20,
        )
        .unwrap();

        let err = asm.assemble(&request, provider()).await.unwrap_err();
        assert!(matches!(
            err,
            MosaicError::TooLarge { tiles, limit: DEFAULT_MAX_TILES } if tiles > 1 << 30
        ));
        let err = asm.assemble_cached(&request, provider()).await.unwrap_err();
        assert!(matches!(err, MosaicError::TooLarge { .. }));

        let grid = MosaicGrid::new(&request).unwrap();
        let err = asm
            .fetch_grid(&grid, provider(), FetchMode::CachedOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, MosaicError::TooLarge { .. }));
        assert_eq!(asm.fetcher().client().request_count(), 0);
    }

    #[tokio::test]
    async fn test_tile_limit_is_inclusive() {
        let dir = TempDir::new().unwrap();
        let config = MosaicConfig {
            max_tiles: 4,
            ..Default::default()
        };
        let asm = assembler(&dir, PatternTileServer::default(), config);

        asm.assemble(&request_at(1.0, 1.0, 3.0, 3.0, 3), provider())
            .await
            .unwrap();
        let err = asm
            .assemble(&request_at(1.0, 1.0, 3.5, 3.0, 3), provider())
            .await
            .unwrap_err();
        assert!(matches!(err, MosaicError::TooLarge { tiles: 6, limit: 4 }));
        assert_eq!(asm.fetcher().client().request_count(), 4);
    }

    #[tokio::test]
    async fn test_single_point_mosaic() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir, PatternTileServer::default(), MosaicConfig::default());
        let image = asm
            .assemble(&request_at(2.5, 1.5, 2.5, 1.5, 3), provider())
            .await
            .unwrap()
            .to_rgb8();

        assert_eq!(image.dimensions(), (512, 512));
        assert_eq!(image.get_pixel(0, 0), pattern_tile(2, 1).get_pixel(0, 0));
        assert_eq!(image.get_pixel(511, 511), pattern_tile(3, 2).get_pixel(255, 255));
        assert_eq!(asm.fetcher().client().request_count(), 4);
    }
}
