//! User configuration file (`config.ini`).

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::cache::{CacheLocation, DEFAULT_MEMORY_BYTES};
use crate::mosaic::{
    MosaicConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_TILES, DEFAULT_ROUGH_CACHE_BYTES,
};
use crate::provider::{DEFAULT_PROVIDER, DEFAULT_TIMEOUT_SECS};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// A key holds a value of the wrong shape
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[provider]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Registry name of the default provider.
    pub name: String,
    /// Look up current Google layer versions before fetching.
    pub google_discover: bool,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Persistent store; a path ending in `.tar` selects an archive. `None`
    /// uses a temporary directory removed on exit.
    pub directory: Option<PathBuf>,
    /// Budget for decoded tiles kept in memory, in bytes.
    pub memory_size: u64,
}

/// `[mosaic]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicSettings {
    pub parallel: bool,
    pub concurrency: usize,
    pub batch_size: Option<usize>,
    /// Largest mosaic, in tiles.
    pub max_tiles: u64,
    /// Budget for memoised stitched mosaics, in bytes.
    pub rough_cache_size: u64,
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// HTTP request timeout in seconds.
    pub timeout: u64,
}

/// Parsed configuration file. Every field has a default, so a missing
/// file or section is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub provider: ProviderSettings,
    pub cache: CacheSettings,
    pub mosaic: MosaicSettings,
    pub download: DownloadSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            provider: ProviderSettings {
                name: DEFAULT_PROVIDER.to_string(),
                google_discover: false,
            },
            cache: CacheSettings {
                directory: None,
                memory_size: DEFAULT_MEMORY_BYTES,
            },
            mosaic: MosaicSettings {
                parallel: true,
                concurrency: DEFAULT_MAX_CONCURRENT,
                batch_size: None,
                max_tiles: DEFAULT_MAX_TILES,
                rough_cache_size: DEFAULT_ROUGH_CACHE_BYTES,
            },
            download: DownloadSettings {
                timeout: DEFAULT_TIMEOUT_SECS,
            },
        }
    }
}

impl ConfigFile {
    /// Loads configuration from [`config_file_path`].
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads configuration from `path`, returning defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parses configuration from INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        super::parser::parse_ini(&ini)
    }

    pub fn cache_location(&self) -> CacheLocation {
        CacheLocation::from_path(self.cache.directory.as_deref())
    }

    pub fn mosaic_config(&self) -> MosaicConfig {
        MosaicConfig {
            parallel: self.mosaic.parallel,
            max_concurrent: self.mosaic.concurrency,
            batch_size: self.mosaic.batch_size,
            max_tiles: self.mosaic.max_tiles,
            rough_cache_bytes: self.mosaic.rough_cache_size,
        }
    }
}

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bingtiles")
}

/// Default configuration file path.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
