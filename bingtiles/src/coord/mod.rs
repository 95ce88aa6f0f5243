//! Coordinate conversion module
//!
//! Provides conversions between geodetic coordinates (latitude/longitude),
//! map pixels, tiles and quadkeys in the spherical Mercator projection used
//! by slippy-map tile providers.
//!
//! All functions are pure. Latitudes and longitudes outside the projectable
//! range are clamped, never rejected.

mod types;

pub use types::{
    CoordError, FractionalTile, GeoCoord, PixelCoord, Quadkey, TileCoord, MAX_LAT, MAX_LON,
    MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM, TILE_SIZE,
};

use std::f64::consts::PI;

/// Equatorial radius of the WGS-84 ellipsoid in metres.
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Returns the width and height of the map in pixels at `zoom`.
#[inline]
pub fn map_size(zoom: u8) -> u64 {
    (TILE_SIZE as u64) << zoom
}

/// Converts a geodetic point into pixel coordinates at `zoom`.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees, clamped to (-85.05112878, 85.05112878)
/// * `lon` - Longitude in degrees, clamped to (-180.0, 180.0)
/// * `zoom` - Level of detail
#[inline]
pub fn geodetic_to_pixel(lat: f64, lon: f64, zoom: u8) -> PixelCoord {
    let point = GeoCoord::new(lat, lon).clamped();

    let x = (point.lon + 180.0) / 360.0;
    let sin_lat = (point.lat * PI / 180.0).sin();
    let y = 0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI);

    let size = map_size(zoom) as f64;
    PixelCoord {
        x: (x * size).clamp(0.0, size - 1.0),
        y: (y * size).clamp(0.0, size - 1.0),
        zoom,
    }
}

/// Converts pixel coordinates back into a geodetic point.
#[inline]
pub fn pixel_to_geodetic(pixel: &PixelCoord) -> GeoCoord {
    let size = map_size(pixel.zoom) as f64;
    let x = pixel.x.clamp(0.0, size - 1.0) / size - 0.5;
    let y = 0.5 - pixel.y.clamp(0.0, size - 1.0) / size;

    let lat = 90.0 - 360.0 * (-y * 2.0 * PI).exp().atan() / PI;
    let lon = 360.0 * x;
    GeoCoord { lat, lon }
}

/// Rescales pixel coordinates to another level of detail.
///
/// Scaling is applied about the pixel centre.
#[inline]
pub fn pixel_to_pixel(pixel: &PixelCoord, new_zoom: u8) -> PixelCoord {
    let size = map_size(pixel.zoom) as f64;
    let new_size = map_size(new_zoom) as f64;
    let x = (pixel.x - 0.5) / size;
    let y = (pixel.y - 0.5) / size;
    PixelCoord {
        x: (x * new_size + 0.5).clamp(0.0, new_size - 1.0),
        y: (y * new_size + 0.5).clamp(0.0, new_size - 1.0),
        zoom: new_zoom,
    }
}

/// Converts pixel coordinates into fractional tile coordinates.
#[inline]
pub fn pixel_to_tile(pixel: &PixelCoord) -> FractionalTile {
    FractionalTile {
        x: pixel.x / TILE_SIZE as f64,
        y: pixel.y / TILE_SIZE as f64,
        zoom: pixel.zoom,
    }
}

/// Converts tile coordinates into the pixel coordinates of the tile's
/// upper-left corner (or of the fractional position inside it).
#[inline]
pub fn tile_to_pixel(tile: &FractionalTile) -> PixelCoord {
    PixelCoord {
        x: tile.x * TILE_SIZE as f64,
        y: tile.y * TILE_SIZE as f64,
        zoom: tile.zoom,
    }
}

/// Reprojects tile coordinates to another level of detail.
#[inline]
pub fn tile_to_tile(tile: &FractionalTile, new_zoom: u8) -> FractionalTile {
    let pixel = tile_to_pixel(tile);
    pixel_to_tile(&pixel_to_pixel(&pixel, new_zoom))
}

/// Converts a geodetic point into fractional tile coordinates.
///
/// Floor the result to address the tile containing the point.
#[inline]
pub fn geodetic_to_tile(lat: f64, lon: f64, zoom: u8) -> FractionalTile {
    pixel_to_tile(&geodetic_to_pixel(lat, lon, zoom))
}

/// Converts tile coordinates into the geodetic point of the tile's
/// upper-left corner.
#[inline]
pub fn tile_to_geodetic(tile: &FractionalTile) -> GeoCoord {
    pixel_to_geodetic(&tile_to_pixel(tile))
}

/// Encodes tile indices as a quadkey.
///
/// Indices must be integral unless `nearest` is set, in which case they are
/// floored first.
pub fn tile_to_quadkey(x: f64, y: f64, zoom: u8, nearest: bool) -> Result<Quadkey, CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    let integral = |v: f64| v.is_finite() && v.fract() == 0.0;
    if !nearest && (!integral(x) || !integral(y)) {
        return Err(CoordError::NonIntegerTileIndex { x, y });
    }
    let tile = TileCoord {
        x: x.floor() as u32,
        y: y.floor() as u32,
        zoom,
    };
    Ok(tile.quadkey())
}

/// Decodes a quadkey into tile indices and level of detail.
pub fn quadkey_to_tile(quadkey: &str) -> Result<TileCoord, CoordError> {
    Quadkey::parse(quadkey).map(|key| key.to_tile())
}

/// Picks a server number for a tile, spreading requests across CDN
/// subdomains.
#[inline]
pub fn server_shard(x: u32, y: u32, max_servers: u32) -> u32 {
    ((x as u64 + 2 * y as u64) % max_servers.max(1) as u64) as u32
}

/// Ground resolution in metres per pixel at `lat` and `zoom`.
pub fn ground_resolution(lat: f64, zoom: u8) -> f64 {
    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    (lat * PI / 180.0).cos() * 2.0 * PI * EARTH_RADIUS / map_size(zoom) as f64
}

/// Map scale at `lat`, `zoom` and screen resolution, as the denominator N
/// of the ratio 1 : N.
pub fn map_scale(lat: f64, zoom: u8, screen_dpi: f64) -> f64 {
    ground_resolution(lat, zoom) * screen_dpi / 0.0254
}
