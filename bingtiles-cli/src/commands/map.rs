//! `map` command: mosaic of a bounding box.

use bingtiles::coord::GeoCoord;
use bingtiles::mosaic::{MosaicGrid, MosaicRequest};
use tracing::info;

use super::common::{write_image, FetchArgs, GlobalArgs, Session};
use crate::error::CliError;

/// Box between `(lat, lon)` and the optional second corner. Without one the
/// request covers the tiles around the point.
pub fn request(
    lat: f64,
    lon: f64,
    lat2: Option<f64>,
    lon2: Option<f64>,
    zoom: u8,
) -> Result<MosaicRequest, CliError> {
    let corner1 = GeoCoord::new(lat, lon);
    let corner2 = GeoCoord::new(lat2.unwrap_or(lat), lon2.unwrap_or(lon));
    Ok(MosaicRequest::new(corner1, corner2, zoom)?)
}

pub async fn run(
    request: MosaicRequest,
    global: &GlobalArgs,
    args: &FetchArgs,
) -> Result<(), CliError> {
    let grid = MosaicGrid::new(&request)?;
    let session = Session::start(global, args).await?;
    session.assembler.check_size(&grid)?;
    let (width, height) = grid.output_size();
    info!(
        tiles = grid.tile_count(),
        zoom = grid.zoom,
        width,
        height,
        provider = session.provider.name(),
        "Building mosaic"
    );

    let provider = session.provider.clone();
    let image = if session.only_cached {
        session
            .assembler
            .assemble_cached(&request, provider)
            .await?
            .ok_or(CliError::NotCached)?
    } else {
        session.assembler.assemble(&request, provider).await?
    };

    write_image(&image, args.output.as_ref())?;
    session.finish()
}
