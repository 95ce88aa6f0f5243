//! `providers` command: list the provider registry.

use bingtiles::coord::TileCoord;
use bingtiles::provider::ProviderRegistry;

use crate::error::CliError;

/// One line per provider: marker, name, zoom range and a sample URL.
pub fn listing(registry: &ProviderRegistry, default: &str) -> Vec<String> {
    let sample = TileCoord::new(1, 1, 2);
    registry
        .names()
        .filter_map(|name| registry.get(name).ok())
        .map(|provider| {
            let marker = if provider.name() == default { '*' } else { ' ' };
            let url = provider.tile_url(&sample).unwrap_or_default();
            format!(
                "{} {:<18} zoom {:>2}-{:<2}  {}",
                marker,
                provider.name(),
                provider.min_zoom(),
                provider.max_zoom(),
                url
            )
        })
        .collect()
}

pub fn run(default: &str) -> Result<(), CliError> {
    let registry = ProviderRegistry::builtin();
    registry.get(default)?;
    for line in listing(&registry, default) {
        println!("{}", line);
    }
    Ok(())
}
