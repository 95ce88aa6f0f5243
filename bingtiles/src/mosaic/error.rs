//! Mosaic assembly errors.

use thiserror::Error;

use crate::cache::TileError;
use crate::coord::{CoordError, TileCoord};

/// Errors that can occur while assembling a mosaic.
///
/// Nothing is retried or skipped: the first failing tile fails the whole
/// mosaic.
#[derive(Debug, Clone, Error)]
pub enum MosaicError {
    /// Invalid request coordinates or zoom.
    #[error("Invalid mosaic request: {0}")]
    Coord(#[from] CoordError),

    /// A tile could not be retrieved.
    #[error(transparent)]
    Tile(#[from] TileError),

    /// A tile image is not 256×256.
    #[error("Tile {tile} is {width}x{height}, expected 256x256")]
    TileSize {
        tile: TileCoord,
        width: u32,
        height: u32,
    },

    /// The bounding box covers no pixels at the requested zoom.
    #[error("Bounding box is empty at zoom {zoom}")]
    EmptyRegion { zoom: u8 },

    /// The grid has more tiles than the assembler is allowed to fetch.
    #[error("Mosaic needs {tiles} tiles, limit is {limit}")]
    TooLarge { tiles: u64, limit: u64 },

    /// Image buffer operations failed.
    #[error("Image error: {0}")]
    Image(String),

    /// A fetch task panicked or was cancelled.
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),
}
