//! `tile` command: fetch the single tile containing a point.

use bingtiles::cache::FetchMode;
use bingtiles::coord::{geodetic_to_tile, CoordError, TileCoord, MAX_ZOOM, MIN_ZOOM};
use tracing::info;

use super::common::{write_image, FetchArgs, GlobalArgs, Session};
use crate::error::CliError;

/// Tile containing `(lat, lon)` at `zoom`.
pub fn tile_at(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CliError> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        return Err(CoordError::InvalidZoom(zoom).into());
    }
    Ok(geodetic_to_tile(lat, lon, zoom).floor())
}

pub async fn run(lat: f64, lon: f64, global: &GlobalArgs, args: &FetchArgs) -> Result<(), CliError> {
    let tile = tile_at(lat, lon, args.lod)?;
    let session = Session::start(global, args).await?;
    info!(%tile, quadkey = %tile.quadkey(), provider = session.provider.name(), "Fetching tile");

    let mode = if session.only_cached {
        FetchMode::CachedOnly
    } else {
        FetchMode::Network
    };
    let image = session
        .assembler
        .fetcher()
        .fetch(&tile, session.provider.as_ref(), mode)
        .await?
        .ok_or(CliError::NotCached)?;

    write_image(&image, args.output.as_ref())?;
    session.finish()
}
