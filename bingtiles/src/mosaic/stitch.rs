//! Stitching tiles into a mosaic, cropping it, and cutting it back up.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel, RgbImage, RgbaImage};

use crate::coord::{TileCoord, TILE_SIZE};

use super::error::MosaicError;
use super::grid::MosaicGrid;

fn check_tile_size(tile: &TileCoord, image: &DynamicImage) -> Result<(), MosaicError> {
    let (width, height) = image.dimensions();
    if width != TILE_SIZE || height != TILE_SIZE {
        return Err(MosaicError::TileSize {
            tile: *tile,
            width,
            height,
        });
    }
    Ok(())
}

fn compose<P, F>(grid: &MosaicGrid, tiles: &[Arc<DynamicImage>], convert: F) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
    F: Fn(&DynamicImage) -> ImageBuffer<P, Vec<u8>>,
{
    let (width, height) = grid.stitched_size();
    let mut canvas = ImageBuffer::new(width, height);
    for (tile, image) in grid.tiles().iter().zip(tiles) {
        let (x, y) = grid.position(tile);
        imageops::replace(&mut canvas, &convert(image), x as i64, y as i64);
    }
    canvas
}

/// Places every tile of the grid into one uncropped image.
///
/// `tiles` must be in grid order. Each tile lands at
/// `((x - min.x) * 256, (y - min.y) * 256)` regardless of the order in which
/// tiles were fetched. The result is RGBA if any tile has an alpha channel,
/// RGB otherwise.
pub fn stitch(grid: &MosaicGrid, tiles: &[Arc<DynamicImage>]) -> Result<DynamicImage, MosaicError> {
    if tiles.len() as u64 != grid.tile_count() {
        return Err(MosaicError::Image(format!(
            "expected {} tiles, got {}",
            grid.tile_count(),
            tiles.len()
        )));
    }
    for (tile, image) in grid.tiles().iter().zip(tiles) {
        check_tile_size(tile, image)?;
    }

    let alpha = tiles.iter().any(|t| t.color().has_alpha());
    Ok(if alpha {
        DynamicImage::ImageRgba8(compose(grid, tiles, |t| t.to_rgba8()))
    } else {
        DynamicImage::ImageRgb8(compose(grid, tiles, |t| t.to_rgb8()))
    })
}

/// Cuts the requested bounding box out of a stitched image.
pub fn crop(grid: &MosaicGrid, stitched: &DynamicImage) -> DynamicImage {
    let (x, y, width, height) = grid.crop_rect();
    stitched.crop_imm(x, y, width, height)
}

/// Cuts a mosaic image back into 256×256 tiles in grid order.
///
/// `image` covers the grid's bounding box; it is resized to the crop size
/// if needed, then padded back into the stitched frame. Pixels outside the
/// bounding box are left transparent (or black for RGB input).
pub fn split_mosaic(
    grid: &MosaicGrid,
    image: &DynamicImage,
) -> Result<Vec<(TileCoord, DynamicImage)>, MosaicError> {
    let (width, height) = grid.output_size();
    let resized;
    let image = if image.dimensions() != (width, height) {
        resized = image.resize_exact(width, height, FilterType::Lanczos3);
        &resized
    } else {
        image
    };

    let (stitched_w, stitched_h) = grid.stitched_size();
    let (x0, y0) = grid.min_frac;
    let frame = if image.color().has_alpha() {
        let mut canvas = RgbaImage::new(stitched_w, stitched_h);
        imageops::replace(&mut canvas, &image.to_rgba8(), x0 as i64, y0 as i64);
        DynamicImage::ImageRgba8(canvas)
    } else {
        let mut canvas = RgbImage::new(stitched_w, stitched_h);
        imageops::replace(&mut canvas, &image.to_rgb8(), x0 as i64, y0 as i64);
        DynamicImage::ImageRgb8(canvas)
    };

    Ok(grid
        .tiles()
        .into_iter()
        .map(|tile| {
            let (x, y) = grid.position(&tile);
            (tile, frame.crop_imm(x, y, TILE_SIZE, TILE_SIZE))
        })
        .collect())
}
