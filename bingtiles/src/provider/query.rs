//! Extra query parameters on top of any provider's URLs.

use std::sync::Arc;

use url::Url;

use crate::coord::TileCoord;
use crate::provider::{ProviderError, TileProvider};

/// Decorator that adds or overrides query parameters on every tile URL.
///
/// Parameters replace existing ones with the same key; new keys are
/// appended in insertion order.
#[derive(Clone)]
pub struct QueryProvider {
    inner: Arc<dyn TileProvider>,
    params: Vec<(String, String)>,
}

impl QueryProvider {
    pub fn new(inner: Arc<dyn TileProvider>) -> Self {
        Self {
            inner,
            params: Vec::new(),
        }
    }

    /// Sets a parameter, replacing an earlier value for the same key.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

impl TileProvider for QueryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn tile_url(&self, tile: &TileCoord) -> Result<String, ProviderError> {
        let base = self.inner.tile_url(tile)?;
        if self.params.is_empty() {
            return Ok(base);
        }

        let mut url = Url::parse(&base).map_err(|e| {
            ProviderError::ProviderSpecific(format!("Invalid tile URL '{}': {}", base, e))
        })?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .into_owned()
            .filter(|(k, _)| !self.params.iter().any(|(p, _)| p == k))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .extend_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(url.into())
    }

    fn min_zoom(&self) -> u8 {
        self.inner.min_zoom()
    }

    fn max_zoom(&self) -> u8 {
        self.inner.max_zoom()
    }
}
