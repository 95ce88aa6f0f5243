//! Provider types and traits

use std::fmt;

use crate::coord::TileCoord;

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// HTTP request failed
    HttpError(String),
    /// Zoom level not supported by this provider
    UnsupportedZoom(u8),
    /// Invalid response data from provider
    InvalidResponse(String),
    /// Provider-specific error
    ProviderSpecific(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::UnsupportedZoom(zoom) => {
                write!(f, "Zoom level {} not supported by provider", zoom)
            }
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ProviderError::ProviderSpecific(msg) => write!(f, "Provider error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Maps tile positions to the URLs a tile server publishes them at.
///
/// Providers never perform I/O themselves; fetching, decoding and caching
/// are the job of [`crate::cache::CachedFetcher`]. Two providers that
/// resolve a tile to the same URL share its cache entry.
pub trait TileProvider: Send + Sync {
    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;

    /// Resolves the URL of a tile.
    ///
    /// Returns [`ProviderError::UnsupportedZoom`] when the tile's zoom is
    /// outside [`min_zoom`](Self::min_zoom)..=[`max_zoom`](Self::max_zoom).
    fn tile_url(&self, tile: &TileCoord) -> Result<String, ProviderError>;

    /// Returns the minimum supported zoom level.
    fn min_zoom(&self) -> u8;

    /// Returns the maximum supported zoom level.
    fn max_zoom(&self) -> u8;

    /// Checks if this provider supports the given zoom level.
    fn supports_zoom(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom() && zoom <= self.max_zoom()
    }
}

/// Shared zoom guard for provider implementations.
pub(crate) fn check_zoom<P: TileProvider + ?Sized>(
    provider: &P,
    tile: &TileCoord,
) -> Result<(), ProviderError> {
    if provider.supports_zoom(tile.zoom) {
        Ok(())
    } else {
        Err(ProviderError::UnsupportedZoom(tile.zoom))
    }
}
