//! bingtiles - slippy-map tiles and bounding-box mosaics
//!
//! The library is layered bottom-up:
//!
//! - [`coord`]: Web Mercator math between geodetic, pixel and tile
//!   coordinates, and Bing quadkeys
//! - [`provider`]: URL schemes of tile servers and the HTTP client seam
//! - [`cache`]: tile stores and the deduplicating [`cache::CachedFetcher`]
//! - [`mosaic`]: covering grids, stitching and concurrent mosaic assembly
//!
//! [`config`] and [`logging`] carry the ambient setup shared by the CLI.

pub mod cache;
pub mod config;
pub mod coord;
pub mod logging;
pub mod mosaic;
pub mod provider;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
