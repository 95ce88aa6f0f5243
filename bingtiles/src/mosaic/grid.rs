//! Tile rectangle covering a geographic bounding box.

use crate::coord::{
    geodetic_to_tile, map_size, CoordError, FractionalTile, GeoCoord, TileCoord, MAX_ZOOM,
    MIN_ZOOM, TILE_SIZE,
};

use super::error::MosaicError;

/// A bounding box between two corners at a level of detail.
///
/// Corners may be given in any order. Identical corners request the tiles
/// around a single point instead of a box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicRequest {
    pub corner1: GeoCoord,
    pub corner2: GeoCoord,
    pub zoom: u8,
}

impl MosaicRequest {
    pub fn new(corner1: GeoCoord, corner2: GeoCoord, zoom: u8) -> Result<Self, CoordError> {
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
            return Err(CoordError::InvalidZoom(zoom));
        }
        Ok(Self {
            corner1,
            corner2,
            zoom,
        })
    }
}

/// Geometry of a mosaic, derived once per request.
///
/// `min` and `max` are the inclusive corners of the covering tile
/// rectangle. `min_frac` is how many pixels of the first tile column/row lie
/// outside the box; `max_frac` how many pixels of the last column/row lie
/// inside it, in `1..=256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicGrid {
    pub zoom: u8,
    pub min: TileCoord,
    pub max: TileCoord,
    pub min_frac: (u32, u32),
    pub max_frac: (u32, u32),
}

/// Integer tile and pixel offsets of one axis.
struct AxisSpan {
    min: u32,
    min_frac: u32,
    max: u32,
    max_frac: u32,
}

fn split_axis(min_f: f64, max_f: f64) -> Option<AxisSpan> {
    let tile = TILE_SIZE as f64;

    let mut min = min_f.trunc() as u32;
    let mut min_frac = ((min_f - min as f64) * tile).round() as u32;
    if min_frac >= TILE_SIZE {
        min += 1;
        min_frac = 0;
    }

    let mut max = max_f.trunc() as u32;
    let mut max_frac = ((max_f - max as f64) * tile).round() as u32;
    if max_frac >= TILE_SIZE {
        max += 1;
        max_frac = 0;
    }
    // A zero offset on the far edge would add a column of nothing
    if max_frac == 0 && max > min {
        max -= 1;
        max_frac = TILE_SIZE;
    }

    let extent = (max as i64 - min as i64) * TILE_SIZE as i64 + max_frac as i64 - min_frac as i64;
    (extent > 0).then_some(AxisSpan {
        min,
        min_frac,
        max,
        max_frac,
    })
}

/// Tile range from `floor(f)` to `ceil(f)` at pixel precision, kept inside
/// the map.
fn around_axis(f: f64, zoom: u8) -> (u32, u32) {
    let tile = TILE_SIZE as u64;
    let last = map_size(zoom) / tile - 1;
    let pixel = (f * tile as f64).round() as u64;
    let min = (pixel / tile).min(last);
    let max = pixel.div_ceil(tile).min(last);
    (min as u32, max as u32)
}

impl MosaicGrid {
    /// Computes the covering tile rectangle and pixel offsets for `request`.
    ///
    /// When both corners land on the same point the grid is the uncropped
    /// block of one to four tiles around it. Otherwise returns
    /// [`MosaicError::EmptyRegion`] when the box has no area at the
    /// requested zoom.
    pub fn new(request: &MosaicRequest) -> Result<Self, MosaicError> {
        let zoom = request.zoom;
        let a = geodetic_to_tile(request.corner1.lat, request.corner1.lon, zoom);
        let b = geodetic_to_tile(request.corner2.lat, request.corner2.lon, zoom);
        if a == b {
            return Ok(Self::around(&a));
        }

        let x = split_axis(a.x.min(b.x), a.x.max(b.x));
        let y = split_axis(a.y.min(b.y), a.y.max(b.y));
        let (Some(x), Some(y)) = (x, y) else {
            return Err(MosaicError::EmptyRegion { zoom });
        };

        Ok(Self {
            zoom,
            min: TileCoord::new(x.min, y.min, zoom),
            max: TileCoord::new(x.max, y.max, zoom),
            min_frac: (x.min_frac, y.min_frac),
            max_frac: (x.max_frac, y.max_frac),
        })
    }

    /// Every tile touching `point`, stitched without cropping.
    fn around(point: &FractionalTile) -> Self {
        let (min_x, max_x) = around_axis(point.x, point.zoom);
        let (min_y, max_y) = around_axis(point.y, point.zoom);
        Self {
            zoom: point.zoom,
            min: TileCoord::new(min_x, min_y, point.zoom),
            max: TileCoord::new(max_x, max_y, point.zoom),
            min_frac: (0, 0),
            max_frac: (TILE_SIZE, TILE_SIZE),
        }
    }

    pub fn columns(&self) -> u32 {
        self.max.x - self.min.x + 1
    }

    pub fn rows(&self) -> u32 {
        self.max.y - self.min.y + 1
    }

    /// Number of tiles in the rectangle, always at least one.
    ///
    /// Check this before calling [`tiles`](Self::tiles) on untrusted
    /// requests: a world-sized box at a deep zoom has trillions of tiles.
    pub fn tile_count(&self) -> u64 {
        self.columns() as u64 * self.rows() as u64
    }

    /// Tiles in grid order: column-major, x outer and y inner.
    pub fn tiles(&self) -> Vec<TileCoord> {
        let mut tiles = Vec::with_capacity(self.tile_count() as usize);
        for x in self.min.x..=self.max.x {
            for y in self.min.y..=self.max.y {
                tiles.push(TileCoord::new(x, y, self.zoom));
            }
        }
        tiles
    }

    /// Position of `tile` in [`tiles`](Self::tiles).
    pub fn index_of(&self, tile: &TileCoord) -> Option<usize> {
        let inside = tile.zoom == self.zoom
            && (self.min.x..=self.max.x).contains(&tile.x)
            && (self.min.y..=self.max.y).contains(&tile.y);
        inside.then(|| {
            (tile.x - self.min.x) as usize * self.rows() as usize + (tile.y - self.min.y) as usize
        })
    }

    /// Upper-left pixel of `tile` in the stitched image.
    pub fn position(&self, tile: &TileCoord) -> (u32, u32) {
        (
            (tile.x - self.min.x) * TILE_SIZE,
            (tile.y - self.min.y) * TILE_SIZE,
        )
    }

    /// Size of the uncropped image made of every tile in the rectangle.
    pub fn stitched_size(&self) -> (u32, u32) {
        (self.columns() * TILE_SIZE, self.rows() * TILE_SIZE)
    }

    /// Crop rectangle `(x, y, width, height)` inside the stitched image.
    pub fn crop_rect(&self) -> (u32, u32, u32, u32) {
        let (width, height) = self.output_size();
        (self.min_frac.0, self.min_frac.1, width, height)
    }

    /// Size of the final, cropped mosaic.
    pub fn output_size(&self) -> (u32, u32) {
        (
            (self.columns() - 1) * TILE_SIZE + self.max_frac.0 - self.min_frac.0,
            (self.rows() - 1) * TILE_SIZE + self.max_frac.1 - self.min_frac.1,
        )
    }
}
