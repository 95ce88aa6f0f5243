//! Bounding-box mosaics
//!
//! A [`MosaicRequest`] names two geographic corners and a zoom. The
//! [`MosaicGrid`] derived from it lists the covering tiles and the pixel
//! offsets needed to crop the stitched tiles down to the box. The
//! [`MosaicAssembler`] fetches the tiles through a shared
//! [`CachedFetcher`](crate::cache::CachedFetcher) and produces the final
//! image.

mod assembler;
mod error;
mod grid;
mod progress;
mod stitch;

pub use assembler::{
    GridTiles, MosaicAssembler, MosaicConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_TILES,
    DEFAULT_ROUGH_CACHE_BYTES,
};
pub use error::MosaicError;
pub use grid::{MosaicGrid, MosaicRequest};
pub use progress::{FetchProgress, NoProgress};
pub use stitch::{crop, split_mosaic, stitch};
