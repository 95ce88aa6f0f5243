//! Bing Maps tile provider.
//!
//! Tiles are addressed by quadkey and spread across four `ecn.t{n}` edge
//! servers.
//!
//! # URL Pattern
//!
//! `http://ecn.t{shard}.tiles.virtualearth.net/tiles/{type}{quadkey}.jpeg?g={generation}`

use crate::coord::{server_shard, TileCoord};
use crate::provider::types::check_zoom;
use crate::provider::{ProviderError, TileProvider};

/// Tile generation requested from the edge servers.
pub const DEFAULT_GENERATION: u32 = 5001;

/// Number of `ecn.t{n}` servers.
const SERVER_COUNT: u32 = 4;

const MIN_ZOOM: u8 = 1;
const MAX_ZOOM: u8 = 19;

/// Bing Maps imagery styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BingStyle {
    Aerial,
    Road,
    Terrain,
    /// Aerial imagery with road and label overlay
    Hybrid,
}

impl BingStyle {
    /// Single-letter tile type prefix used in the URL.
    pub fn code(&self) -> char {
        match self {
            BingStyle::Aerial => 'a',
            BingStyle::Road => 'r',
            BingStyle::Terrain => 't',
            BingStyle::Hybrid => 'h',
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BingStyle::Aerial => "bing_aerial",
            BingStyle::Road => "bing_road",
            BingStyle::Terrain => "bing_terrain",
            BingStyle::Hybrid => "bing_hybrid",
        }
    }
}

/// Bing Maps provider for one imagery style.
#[derive(Debug, Clone)]
pub struct BingProvider {
    style: BingStyle,
    generation: u32,
}

impl BingProvider {
    pub fn new(style: BingStyle) -> Self {
        Self {
            style,
            generation: DEFAULT_GENERATION,
        }
    }

    /// Overrides the `g=` generation parameter.
    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    pub fn style(&self) -> BingStyle {
        self.style
    }
}

impl TileProvider for BingProvider {
    fn name(&self) -> &str {
        self.style.name()
    }

    fn tile_url(&self, tile: &TileCoord) -> Result<String, ProviderError> {
        check_zoom(self, tile)?;
        let shard = server_shard(tile.x, tile.y, SERVER_COUNT);
        Ok(format!(
            "http://ecn.t{}.tiles.virtualearth.net/tiles/{}{}.jpeg?g={}",
            shard,
            self.style.code(),
            tile.quadkey(),
            self.generation
        ))
    }

    fn min_zoom(&self) -> u8 {
        MIN_ZOOM
    }

    fn max_zoom(&self) -> u8 {
        MAX_ZOOM
    }
}
