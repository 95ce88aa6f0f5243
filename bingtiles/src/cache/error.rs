//! Tile retrieval errors.

use std::sync::Arc;

use thiserror::Error;

use super::traits::StoreError;
use crate::coord::TileCoord;
use crate::provider::ProviderError;

/// Errors that can occur while retrieving a single tile.
///
/// Cloneable so that every caller coalesced onto one in-flight download
/// receives the same error.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// The provider could not produce a URL for the tile.
    #[error("Provider cannot resolve tile {tile}: {source}")]
    Provider {
        tile: TileCoord,
        source: ProviderError,
    },

    /// The download failed (transport error or non-success status).
    #[error("Failed to fetch tile {tile} from {url}: {source}")]
    Fetch {
        tile: TileCoord,
        url: String,
        source: ProviderError,
    },

    /// The tile bytes are not a decodable image.
    #[error("Failed to decode tile {tile} from {url}: {message}")]
    Decode {
        tile: TileCoord,
        url: String,
        message: String,
    },

    /// Reading or writing the persistent cache failed.
    #[error("Tile cache error: {0}")]
    Store(Arc<StoreError>),

    /// The provider produced a URL that does not parse.
    #[error("Invalid tile URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<StoreError> for TileError {
    fn from(e: StoreError) -> Self {
        TileError::Store(Arc::new(e))
    }
}

impl TileError {
    /// The URL involved in the failure, when known.
    pub fn url(&self) -> Option<&str> {
        match self {
            TileError::Fetch { url, .. }
            | TileError::Decode { url, .. }
            | TileError::InvalidUrl { url, .. } => Some(url),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_names_tile_and_url() {
        let err = TileError::Fetch {
            tile: TileCoord::new(5, 3, 3),
            url: "http://t.test/3/5/3.png".to_string(),
            source: ProviderError::HttpError("HTTP 404 Not Found from http://t.test/3/5/3.png".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("5,3,3"));
        assert!(msg.contains("http://t.test/3/5/3.png"));
        assert_eq!(err.url(), Some("http://t.test/3/5/3.png"));
    }

    #[test]
    fn test_store_error_conversion() {
        let err: TileError = StoreError::Archive("truncated".to_string()).into();
        assert_eq!(err.to_string(), "Tile cache error: Archive error: truncated");
        assert_eq!(err.url(), None);
    }
}
