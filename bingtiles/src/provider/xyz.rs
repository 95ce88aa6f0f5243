//! Generic URL-template provider for arbitrary slippy-map servers.

use crate::coord::{server_shard, TileCoord, MAX_ZOOM, MIN_ZOOM};
use crate::provider::types::check_zoom;
use crate::provider::{ProviderError, TileProvider};

/// Provider built from a URL template.
///
/// Recognised placeholders:
///
/// | Placeholder | Value                                   |
/// |-------------|-----------------------------------------|
/// | `{x}`       | tile column                             |
/// | `{y}`       | tile row                                |
/// | `{z}`       | zoom level                              |
/// | `{q}`       | quadkey                                 |
/// | `{s}`       | server shard, `(x + 2y) % servers`      |
///
/// ```
/// use bingtiles::coord::TileCoord;
/// use bingtiles::provider::{TileProvider, XyzProvider};
///
/// let osm = XyzProvider::new("osm", "https://tile.openstreetmap.org/{z}/{x}/{y}.png");
/// let url = osm.tile_url(&TileCoord::new(5, 3, 3)).unwrap();
/// assert_eq!(url, "https://tile.openstreetmap.org/3/5/3.png");
/// ```
#[derive(Debug, Clone)]
pub struct XyzProvider {
    name: String,
    template: String,
    servers: u32,
    min_zoom: u8,
    max_zoom: u8,
}

impl XyzProvider {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            servers: 4,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }

    /// Sets the number of servers `{s}` cycles through.
    pub fn with_servers(mut self, servers: u32) -> Self {
        self.servers = servers.max(1);
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl TileProvider for XyzProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn tile_url(&self, tile: &TileCoord) -> Result<String, ProviderError> {
        check_zoom(self, tile)?;
        let mut url = self
            .template
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
            .replace("{z}", &tile.zoom.to_string());
        if url.contains("{q}") {
            url = url.replace("{q}", tile.quadkey().as_str());
        }
        if url.contains("{s}") {
            let shard = server_shard(tile.x, tile.y, self.servers);
            url = url.replace("{s}", &shard.to_string());
        }
        Ok(url)
    }

    fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }
}
