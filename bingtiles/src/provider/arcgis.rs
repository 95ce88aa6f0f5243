//! Esri ArcGIS Online basemap provider.
//!
//! Serves Esri's public basemaps (imagery, streets, terrain, topographic)
//! with no authentication for the public tier.
//!
//! # URL Pattern
//!
//! `https://server.arcgisonline.com/ArcGIS/rest/services/{service}/MapServer/tile/{z}/{y}/{x}`
//!
//! ArcGIS orders the path as zoom, row, column.

use crate::coord::TileCoord;
use crate::provider::types::check_zoom;
use crate::provider::{ProviderError, TileProvider};

/// Base URL for ArcGIS Online map services.
const ARCGIS_BASE_URL: &str = "https://server.arcgisonline.com/ArcGIS/rest/services";

/// Minimum zoom level supported by ArcGIS basemaps.
const MIN_ZOOM: u8 = 1;

/// Maximum zoom level supported by ArcGIS basemaps.
/// Imagery reaches zoom 19 in most areas.
const MAX_ZOOM: u8 = 19;

/// Esri basemap services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsriService {
    /// World_Imagery
    Aerial,
    /// World_Street_Map
    Road,
    /// World_Terrain_Base
    Terrain,
    /// World_Topo_Map
    Topo,
}

impl EsriService {
    pub fn service_name(&self) -> &'static str {
        match self {
            EsriService::Aerial => "World_Imagery",
            EsriService::Road => "World_Street_Map",
            EsriService::Terrain => "World_Terrain_Base",
            EsriService::Topo => "World_Topo_Map",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            EsriService::Aerial => "esri_aerial",
            EsriService::Road => "esri_road",
            EsriService::Terrain => "esri_terrain",
            EsriService::Topo => "esri_topo",
        }
    }
}

/// ArcGIS Online provider for one basemap service.
#[derive(Debug, Clone)]
pub struct EsriProvider {
    service: EsriService,
}

impl EsriProvider {
    pub fn new(service: EsriService) -> Self {
        Self { service }
    }

    /// Builds the tile URL for the given coordinates.
    fn build_url(&self, tile: &TileCoord) -> String {
        format!(
            "{}/{}/MapServer/tile/{}/{}/{}",
            ARCGIS_BASE_URL,
            self.service.service_name(),
            tile.zoom,
            tile.y,
            tile.x
        )
    }
}

impl TileProvider for EsriProvider {
    fn name(&self) -> &str {
        self.service.name()
    }

    fn tile_url(&self, tile: &TileCoord) -> Result<String, ProviderError> {
        check_zoom(self, tile)?;
        Ok(self.build_url(tile))
    }

    fn min_zoom(&self) -> u8 {
        MIN_ZOOM
    }

    fn max_zoom(&self) -> u8 {
        MAX_ZOOM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        assert_eq!(EsriProvider::new(EsriService::Aerial).name(), "esri_aerial");
        assert_eq!(EsriProvider::new(EsriService::Topo).name(), "esri_topo");
    }

    #[test]
    fn test_zoom_range() {
        let provider = EsriProvider::new(EsriService::Aerial);
        assert_eq!(provider.min_zoom(), 1);
        assert_eq!(provider.max_zoom(), 19);
        assert!(provider.supports_zoom(10));
        assert!(!provider.supports_zoom(20));
    }

    #[test]
    fn test_url_construction() {
        let provider = EsriProvider::new(EsriService::Aerial);
        let url = provider.tile_url(&TileCoord::new(200, 100, 15)).unwrap();
        assert_eq!(
            url,
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/15/100/200"
        );
    }

    #[test]
    fn test_url_construction_max_zoom() {
        let provider = EsriProvider::new(EsriService::Road);
        let url = provider.tile_url(&TileCoord::new(524287, 262143, 19)).unwrap();
        assert_eq!(
            url,
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Street_Map/MapServer/tile/19/262143/524287"
        );
    }

    #[test]
    fn test_service_names() {
        assert_eq!(EsriService::Terrain.service_name(), "World_Terrain_Base");
        assert_eq!(EsriService::Topo.service_name(), "World_Topo_Map");
    }

    #[test]
    fn test_unsupported_zoom() {
        let provider = EsriProvider::new(EsriService::Terrain);
        let err = provider.tile_url(&TileCoord::new(0, 0, 22)).unwrap_err();
        assert_eq!(err, ProviderError::UnsupportedZoom(22));
    }
}
