//! CLI error handling with user-friendly messages.
//!
//! Every command returns a [`CliError`]; `main` prints it and exits with
//! status 1.

use std::fmt;
use std::io;
use std::process;

use bingtiles::cache::{StoreError, TileError};
use bingtiles::config::ConfigFileError;
use bingtiles::coord::CoordError;
use bingtiles::mosaic::MosaicError;
use bingtiles::provider::ProviderError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file or flag error
    Config(String),
    /// Bad coordinates or zoom on the command line
    Coord(CoordError),
    /// Provider lookup or HTTP client setup failed
    Provider(ProviderError),
    /// Opening or reading the tile cache failed
    Cache(StoreError),
    /// A single tile could not be retrieved
    Tile(TileError),
    /// A mosaic could not be assembled
    Mosaic(MosaicError),
    /// `--only-cached` was given and some tile is not cached
    NotCached,
    /// Failed to encode or write the output image
    Output { path: String, error: String },
    /// Refusing to write binary image data to a terminal
    TerminalOutput,
    /// Failed to start the async runtime
    Runtime(io::Error),
}

impl CliError {
    /// Prints the error and exits with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Tile(TileError::Fetch { .. })
            | CliError::Mosaic(MosaicError::Tile(TileError::Fetch { .. })) => {
                eprintln!();
                eprintln!("The tile server refused or failed the request. Check that:");
                eprintln!("  1. The zoom level is supported by the provider (see 'bingtiles providers')");
                eprintln!("  2. The network is reachable, or use --only-cached with a filled cache");
            }
            CliError::Mosaic(MosaicError::TooLarge { .. }) => {
                eprintln!();
                eprintln!("Lower --lod, shrink the box, or raise --max-tiles.");
            }
            CliError::NotCached => {
                eprintln!();
                eprintln!("Run the same command without --only-cached to download the missing tiles.");
            }
            CliError::TerminalOutput => {
                eprintln!();
                eprintln!("Use -o FILE, or redirect stdout: bingtiles map ... > out.png");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Coord(e) => write!(f, "Invalid position: {}", e),
            CliError::Provider(e) => write!(f, "Provider error: {}", e),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::Tile(e) => write!(f, "{}", e),
            CliError::Mosaic(e) => write!(f, "Failed to build mosaic: {}", e),
            CliError::NotCached => write!(f, "Not every tile is in the cache"),
            CliError::Output { path, error } => {
                write!(f, "Failed to write image '{}': {}", path, error)
            }
            CliError::TerminalOutput => write!(f, "Refusing to write PNG data to a terminal"),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Coord(e) => Some(e),
            CliError::Provider(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::Tile(e) => Some(e),
            CliError::Mosaic(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Coord(e)
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Provider(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Cache(e)
    }
}

impl From<TileError> for CliError {
    fn from(e: TileError) -> Self {
        CliError::Tile(e)
    }
}

impl From<MosaicError> for CliError {
    fn from(e: MosaicError) -> Self {
        CliError::Mosaic(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bingtiles::coord::TileCoord;

    #[test]
    fn test_fetch_failure_message_names_url() {
        let err = CliError::from(TileError::Fetch {
            tile: TileCoord::new(1, 2, 3),
            url: "http://tiles.test/3/1/2.png".to_string(),
            source: ProviderError::HttpError("HTTP 500".to_string()),
        });
        let msg = err.to_string();
        assert!(msg.contains("http://tiles.test/3/1/2.png"));
        assert!(msg.contains("HTTP 500"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: CliError = ConfigFileError::InvalidValue {
            section: "mosaic".to_string(),
            key: "parallel".to_string(),
            value: "maybe".to_string(),
            reason: "must be true or false".to_string(),
        }
        .into();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error: "));
    }
}
