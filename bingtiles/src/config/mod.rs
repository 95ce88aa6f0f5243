//! Configuration file support.
//!
//! Settings live in an INI file at [`config_file_path`]
//! (`<config dir>/bingtiles/config.ini`):
//!
//! ```ini
//! [provider]
//! name = bing_hybrid
//!
//! [cache]
//! directory = ~/tiles.tar
//! memory_size = 256MB
//!
//! [mosaic]
//! parallel = true
//! concurrency = 16
//! batch_size = 0
//! max_tiles = 4096
//!
//! [download]
//! timeout = 30
//! ```
//!
//! Command-line flags override file values.

mod file;
mod parser;
mod size;

pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    DownloadSettings, MosaicSettings, ProviderSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
