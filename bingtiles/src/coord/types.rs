//! Coordinate type definitions

use std::fmt;

use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Supported levels of detail
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 23;

/// Edge length of a map tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// A point in WGS-84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoord {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns the point with latitude and longitude clamped to the
    /// projectable range.
    pub fn clamped(&self) -> Self {
        Self {
            lat: self.lat.clamp(MIN_LAT, MAX_LAT),
            lon: self.lon.clamp(MIN_LON, MAX_LON),
        }
    }
}

/// Real-valued pixel position in the full map raster at `zoom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCoord {
    pub x: f64,
    pub y: f64,
    pub zoom: u8,
}

/// Real-valued tile position, i.e. a pixel position divided by the tile size.
///
/// The integer part addresses a tile, the fractional part is the position
/// inside that tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractionalTile {
    pub x: f64,
    pub y: f64,
    pub zoom: u8,
}

impl FractionalTile {
    /// Floors both components to the tile containing this position.
    #[inline]
    pub fn floor(&self) -> TileCoord {
        TileCoord {
            x: self.x.floor() as u32,
            y: self.y.floor() as u32,
            zoom: self.zoom,
        }
    }
}

impl From<TileCoord> for FractionalTile {
    fn from(tile: TileCoord) -> Self {
        Self {
            x: tile.x as f64,
            y: tile.y as f64,
            zoom: tile.zoom,
        }
    }
}

/// Integer tile indices in the slippy-map grid.
///
/// `x` grows eastward and `y` southward, both in `[0, 2^zoom - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Encodes this tile as a quadkey.
    ///
    /// Digits are emitted from the most significant bit down; each digit is
    /// `bitX + 2 * bitY`.
    pub fn quadkey(&self) -> Quadkey {
        let mut key = String::with_capacity(self.zoom as usize);
        for i in (1..=self.zoom).rev() {
            let mask = 1u32 << (i - 1);
            let mut digit = b'0';
            if self.x & mask != 0 {
                digit += 1;
            }
            if self.y & mask != 0 {
                digit += 2;
            }
            key.push(digit as char);
        }
        Quadkey(key)
    }

    /// Returns true if both indices fall inside the grid at this zoom.
    pub fn is_valid(&self) -> bool {
        let n = 1u64 << self.zoom;
        (self.x as u64) < n && (self.y as u64) < n
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.zoom)
    }
}

/// Base-4 tile address used by Bing Maps.
///
/// Always holds a validated digit string; construct with
/// [`Quadkey::parse`] or [`TileCoord::quadkey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quadkey(String);

impl Quadkey {
    /// Validates a quadkey string.
    pub fn parse(key: &str) -> Result<Self, CoordError> {
        if key.len() > MAX_ZOOM as usize || !key.bytes().all(|b| (b'0'..=b'3').contains(&b)) {
            return Err(CoordError::InvalidQuadkey(key.to_string()));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Level of detail encoded by this key.
    pub fn zoom(&self) -> u8 {
        self.0.len() as u8
    }

    /// Decodes the key back into tile indices.
    pub fn to_tile(&self) -> TileCoord {
        let zoom = self.zoom();
        let mut x = 0u32;
        let mut y = 0u32;
        for (i, digit) in self.0.bytes().enumerate() {
            let mask = 1u32 << (zoom as usize - 1 - i);
            match digit {
                b'1' => x |= mask,
                b'2' => y |= mask,
                b'3' => {
                    x |= mask;
                    y |= mask;
                }
                _ => {}
            }
        }
        TileCoord { x, y, zoom }
    }
}

impl fmt::Display for Quadkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur during coordinate conversion.
///
/// Latitudes and longitudes outside the projectable range are clamped, not
/// reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Quadkey contains a digit outside 0-3 or is too long
    #[error("Invalid quadkey: '{0}' (must contain only digits 0-3 and length <= {MAX_ZOOM})")]
    InvalidQuadkey(String),

    /// Fractional tile indices passed where integers are required
    #[error("Tile indices must be integers, got ({x}, {y}); round them first or request nearest")]
    NonIntegerTileIndex { x: f64, y: f64 },

    /// Zoom level is outside the supported range
    #[error("Invalid zoom level: {0} (must be between {MIN_ZOOM} and {MAX_ZOOM})")]
    InvalidZoom(u8),
}
