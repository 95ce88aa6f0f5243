//! Named provider lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::provider::{
    BingProvider, BingStyle, EsriProvider, EsriService, GoogleLayer, GoogleProvider,
    GoogleVersions, ProviderError, TileProvider,
};

/// Provider used when none is named.
pub const DEFAULT_PROVIDER: &str = "bing_hybrid";

/// Registry mapping provider names to providers.
///
/// Owned by the caller rather than held in global state, so tests and
/// embedders can register their own providers without side effects.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn TileProvider>>,
    default: String,
}

impl ProviderRegistry {
    /// Creates an empty registry with `bing_hybrid` as the default name.
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
            default: DEFAULT_PROVIDER.to_string(),
        }
    }

    /// Registry with every built-in Bing, Esri and Google provider.
    pub fn builtin() -> Self {
        Self::with_google_versions(&GoogleVersions::default())
    }

    /// Like [`builtin`](Self::builtin), with Google layers pinned to
    /// discovered versions.
    pub fn with_google_versions(versions: &GoogleVersions) -> Self {
        let mut registry = Self::new();
        for style in [
            BingStyle::Aerial,
            BingStyle::Road,
            BingStyle::Terrain,
            BingStyle::Hybrid,
        ] {
            registry.register(Arc::new(BingProvider::new(style)));
        }
        for service in [
            EsriService::Aerial,
            EsriService::Road,
            EsriService::Terrain,
            EsriService::Topo,
        ] {
            registry.register(Arc::new(EsriProvider::new(service)));
        }
        for layer in GoogleLayer::ALL {
            let provider: GoogleProvider = versions.provider(layer);
            registry.register(Arc::new(provider));
        }
        registry
    }

    /// Registers a provider under its own name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn TileProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Sets the name returned by [`default_provider`](Self::default_provider).
    pub fn set_default(&mut self, name: &str) -> Result<(), ProviderError> {
        self.get(name)?;
        self.default = name.to_string();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn TileProvider>, ProviderError> {
        self.providers.get(name).cloned().ok_or_else(|| {
            ProviderError::ProviderSpecific(format!(
                "Unknown provider '{}' (available: {})",
                name,
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn default_provider(&self) -> Result<Arc<dyn TileProvider>, ProviderError> {
        self.get(&self.default)
    }

    /// Provider names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
