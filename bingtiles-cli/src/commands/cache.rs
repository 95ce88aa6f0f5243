//! `cache` command: report what a tile cache holds.

use std::path::Path;

use bingtiles::cache::{cache_stats, CacheLocation};

use crate::error::CliError;

pub async fn run(path: &Path) -> Result<(), CliError> {
    if !path.exists() {
        return Err(CliError::Config(format!("No cache at {}", path.display())));
    }
    let location = CacheLocation::from_path(Some(path));
    let summary = cache_stats(&location).await?;

    println!("Cache: {}", location);
    println!("  Backend: {}", summary.kind);
    println!("  Tiles:   {}", summary.entries);
    Ok(())
}
