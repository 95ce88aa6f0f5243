//! Tile provider abstraction
//!
//! Providers map tile positions to URLs; they never touch the network
//! themselves. Downloading goes through an [`AsyncHttpClient`] owned by the
//! caching fetcher.
//!
//! # Registry
//!
//! Built-in providers are looked up by name through a [`ProviderRegistry`]:
//!
//! ```
//! use bingtiles::coord::TileCoord;
//! use bingtiles::provider::ProviderRegistry;
//!
//! let registry = ProviderRegistry::builtin();
//! let provider = registry.get("esri_aerial").unwrap();
//! let url = provider.tile_url(&TileCoord::new(200, 100, 15)).unwrap();
//! assert!(url.ends_with("/tile/15/100/200"));
//! ```

mod arcgis;
mod bing;
mod google;
mod http;
mod query;
mod registry;
mod types;
mod xyz;

pub use arcgis::{EsriProvider, EsriService};
pub use bing::{BingProvider, BingStyle, DEFAULT_GENERATION};
pub use google::{
    discover_google_versions, GoogleLayer, GoogleProvider, GoogleVersions, GOOGLE_API_JS_URL,
};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use query::QueryProvider;
pub use registry::{ProviderRegistry, DEFAULT_PROVIDER};
pub use types::{ProviderError, TileProvider};
pub use xyz::XyzProvider;

#[cfg(test)]
pub use http::tests::{
    encode_png, parse_xyz, pattern_tile, MockAsyncHttpClient, PatternTileServer,
};
