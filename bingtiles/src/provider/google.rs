//! Google Maps tile provider (legacy public endpoints).
//!
//! Uses the unauthenticated tile servers behind the old Maps JavaScript API.
//! Each layer has a server prefix, a request path and a version string that
//! Google bumps from time to time; built-in defaults are used unless
//! [`discover_google_versions`] finds newer ones.
//!
//! # URL Pattern
//!
//! `http://{server}{n}.google.com/{request}/lyrs={version}&hl=en&x={x}{sec1}&y={y}&z={z}&s={sec2}`
//!
//! Satellite and terrain use `v={version}` in place of `lyrs=`. `sec1` and
//! `sec2` reproduce the padding the web client adds to its requests.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::coord::{server_shard, TileCoord};
use crate::provider::types::check_zoom;
use crate::provider::{AsyncHttpClient, ProviderError, TileProvider};

/// Page the layer versions are scraped from.
pub const GOOGLE_API_JS_URL: &str = "http://maps.google.com/maps/api/js?v=3.2&sensor=false";

const SERVER_COUNT: u32 = 4;
const MIN_ZOOM: u8 = 1;
const MAX_ZOOM: u8 = 22;

/// Google map layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleLayer {
    Map,
    Satellite,
    /// Satellite imagery from the vector tile servers
    Satellite2,
    Labels,
    Terrain,
    Hybrid,
}

/// Which of the two URL shapes a layer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlStyle {
    Lyrs,
    Version,
}

impl GoogleLayer {
    pub const ALL: [GoogleLayer; 6] = [
        GoogleLayer::Map,
        GoogleLayer::Satellite,
        GoogleLayer::Satellite2,
        GoogleLayer::Labels,
        GoogleLayer::Terrain,
        GoogleLayer::Hybrid,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GoogleLayer::Map => "google_map",
            GoogleLayer::Satellite => "google_satellite",
            GoogleLayer::Satellite2 => "google_satellite2",
            GoogleLayer::Labels => "google_labels",
            GoogleLayer::Terrain => "google_terrain",
            GoogleLayer::Hybrid => "google_hybrid",
        }
    }

    /// Version string used when discovery is skipped or fails.
    pub fn default_version(&self) -> &'static str {
        match self {
            GoogleLayer::Map => "m@354000000",
            GoogleLayer::Satellite => "944",
            GoogleLayer::Satellite2 => "s",
            GoogleLayer::Labels => "h@336",
            GoogleLayer::Terrain => "t@354,r@354000000",
            GoogleLayer::Hybrid => "y",
        }
    }

    // (server prefix, request path, url style)
    fn endpoint(&self) -> (&'static str, &'static str, UrlStyle) {
        match self {
            GoogleLayer::Map => ("m", "mt", UrlStyle::Lyrs),
            GoogleLayer::Satellite => ("khm", "kh", UrlStyle::Version),
            GoogleLayer::Satellite2 => ("mt", "vt", UrlStyle::Lyrs),
            GoogleLayer::Labels => ("mts", "vt", UrlStyle::Lyrs),
            GoogleLayer::Terrain => ("mt", "vt", UrlStyle::Version),
            GoogleLayer::Hybrid => ("mt", "vt", UrlStyle::Lyrs),
        }
    }
}

/// Google provider for one layer.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    layer: GoogleLayer,
    version: String,
}

impl GoogleProvider {
    pub fn new(layer: GoogleLayer) -> Self {
        Self {
            layer,
            version: layer.default_version().to_string(),
        }
    }

    /// Uses an explicit layer version instead of the built-in default.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn layer(&self) -> GoogleLayer {
        self.layer
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Request padding derived from the tile position.
///
/// Returns `(sec1, sec2)`: `sec1` is an extra `&s=` for rows in
/// `10000..100000`, `sec2` a prefix of "Galileo" of length `(3x + y) % 8`.
fn sections(x: u32, y: u32) -> (&'static str, &'static str) {
    const GALILEO: &str = "Galileo";
    let len = ((x as u64 * 3 + y as u64) % 8) as usize;
    let sec2 = &GALILEO[..len.min(GALILEO.len())];
    let sec1 = if (10_000..100_000).contains(&y) {
        "&s="
    } else {
        ""
    };
    (sec1, sec2)
}

impl TileProvider for GoogleProvider {
    fn name(&self) -> &str {
        self.layer.name()
    }

    fn tile_url(&self, tile: &TileCoord) -> Result<String, ProviderError> {
        check_zoom(self, tile)?;
        let (server, request, style) = self.layer.endpoint();
        let (sec1, sec2) = sections(tile.x, tile.y);
        let key = match style {
            UrlStyle::Lyrs => "lyrs",
            UrlStyle::Version => "v",
        };
        Ok(format!(
            "http://{}{}.google.com/{}/{}={}&hl=en&x={}{}&y={}&z={}&s={}",
            server,
            server_shard(tile.x, tile.y, SERVER_COUNT),
            request,
            key,
            self.version,
            tile.x,
            sec1,
            tile.y,
            tile.zoom,
            sec2
        ))
    }

    fn min_zoom(&self) -> u8 {
        MIN_ZOOM
    }

    fn max_zoom(&self) -> u8 {
        MAX_ZOOM
    }
}

/// Layer versions found in the Maps JavaScript API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoogleVersions {
    pub map: Option<String>,
    pub satellite: Option<String>,
    pub terrain: Option<String>,
}

impl GoogleVersions {
    /// Extracts layer versions from the API script.
    pub fn parse(js: &str) -> Self {
        let capture = |re: &Regex| {
            re.captures(js)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };
        let (map, satellite, terrain) = patterns();
        Self {
            map: capture(map),
            satellite: capture(satellite),
            terrain: capture(terrain),
        }
    }

    /// Returns the discovered version for `layer`, or its default.
    pub fn version_for(&self, layer: GoogleLayer) -> &str {
        let found = match layer {
            GoogleLayer::Map => self.map.as_deref(),
            GoogleLayer::Satellite => self.satellite.as_deref(),
            GoogleLayer::Terrain => self.terrain.as_deref(),
            _ => None,
        };
        found.unwrap_or_else(|| layer.default_version())
    }

    /// Builds a provider for `layer` pinned to the discovered version.
    pub fn provider(&self, layer: GoogleLayer) -> GoogleProvider {
        GoogleProvider::new(layer).with_version(self.version_for(layer))
    }
}

fn patterns() -> &'static (Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r#""*https?://mt\D?\d..*/vt\?lyrs=(m@\d*)"#).unwrap(),
            Regex::new(r#""*https?://khm\D?\d.googleapis.com/kh\?v=(\d*)"#).unwrap(),
            Regex::new(r#""*https?://mt\D?\d..*/vt\?lyrs=(t@\d*,r@\d*)"#).unwrap(),
        )
    })
}

/// Downloads the Maps JavaScript API and scrapes current layer versions.
///
/// Layers missing from the script keep their defaults; only a failed
/// download is an error.
pub async fn discover_google_versions<C: AsyncHttpClient>(
    client: &C,
) -> Result<GoogleVersions, ProviderError> {
    let body = client.get(GOOGLE_API_JS_URL).await?;
    let js = String::from_utf8_lossy(&body);
    let versions = GoogleVersions::parse(&js);

    if versions == GoogleVersions::default() {
        warn!("No Google layer versions found in API script, using defaults");
    } else {
        debug!(
            map = ?versions.map,
            satellite = ?versions.satellite,
            terrain = ?versions.terrain,
            "Discovered Google layer versions"
        );
    }
    Ok(versions)
}
