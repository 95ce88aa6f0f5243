//! Flags and setup shared by the tile-fetching commands.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};

use bingtiles::cache::{CacheLocation, CachedFetcher};
use bingtiles::config::{config_file_path, parse_size, ConfigFile};
use bingtiles::logging::{init_logging, LogOptions, LoggingGuard};
use bingtiles::mosaic::{MosaicAssembler, MosaicConfig};
use bingtiles::provider::{
    discover_google_versions, AsyncReqwestClient, ProviderRegistry, QueryProvider, TileProvider,
};

use crate::error::CliError;
use crate::progress::BarProgress;

/// Options accepted by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Configuration file (default: <config dir>/bingtiles/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write log events to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

/// Options of the `tile` and `map` commands.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Level of detail (zoom)
    #[arg(short, long = "lod", default_value_t = 17)]
    pub lod: u8,

    /// Output image; format follows the extension. PNG to stdout if omitted.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Tile cache: a directory, or a file ending in .tar. Temporary if omitted.
    #[arg(short = 'z', long = "cache", value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Tile provider name (see `bingtiles providers`)
    #[arg(long)]
    pub provider: Option<String>,

    /// Extra query parameter added to every tile URL (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Tile generation, same as `--param g=N`
    #[arg(short = 'g', long)]
    pub generation: Option<u32>,

    /// Show a progress bar
    #[arg(short, long)]
    pub progress: bool,

    /// Never download; fail if a tile is not cached
    #[arg(long)]
    pub only_cached: bool,

    /// Fetch tiles one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Maximum concurrent downloads
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Fetch tiles in batches of this size
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Refuse mosaics needing more than N tiles
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_tiles: Option<u64>,

    /// Memory budget for decoded tiles, e.g. 256MB
    #[arg(long, value_name = "SIZE", value_parser = parse_size_arg)]
    pub memory_size: Option<u64>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Look up current Google layer versions before fetching
    #[arg(long)]
    pub google_discover: bool,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn parse_size_arg(s: &str) -> Result<u64, String> {
    parse_size(s).map_err(|e| e.to_string())
}

/// Loads the configuration file named by `--config`, or the default one.
pub fn load_config(global: &GlobalArgs) -> Result<ConfigFile, CliError> {
    let path = global.config.clone().unwrap_or_else(config_file_path);
    if global.config.is_some() && !path.exists() {
        return Err(CliError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    Ok(ConfigFile::load_from(&path)?)
}

/// State shared by a fetching command: logging, settings and the
/// assembler with its fetcher.
pub struct Session {
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    pub assembler: MosaicAssembler<AsyncReqwestClient>,
    pub provider: Arc<dyn TileProvider>,
    pub only_cached: bool,
}

impl Session {
    /// Resolves flags over the config file and opens the cache.
    ///
    /// Flags take precedence over the config file, which takes precedence
    /// over built-in defaults.
    pub async fn start(global: &GlobalArgs, args: &FetchArgs) -> Result<Self, CliError> {
        let config = load_config(global)?;
        let logging_guard = init_logging(&LogOptions {
            verbose: global.verbose,
            log_file: global.log_file.clone(),
        })
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
        info!("bingtiles v{}", bingtiles::VERSION);

        let timeout = args.timeout.unwrap_or(config.download.timeout);
        let client = AsyncReqwestClient::with_timeout(timeout)?;

        let discover = args.google_discover || config.provider.google_discover;
        let registry = build_registry(&client, discover).await;
        let name = args.provider.as_deref().unwrap_or(&config.provider.name);
        let provider = with_params(registry.get(name)?, args);
        debug!(provider = provider.name(), "Resolved provider");

        let mut location = config.cache_location();
        if let Some(path) = &args.cache {
            location = CacheLocation::from_path(Some(path.as_path()));
        }
        let memory = args.memory_size.unwrap_or(config.cache.memory_size);
        let fetcher = CachedFetcher::open(location, client, memory)?;

        let assembler = MosaicAssembler::new(Arc::new(fetcher), mosaic_config(&config, args));
        let assembler = if args.progress {
            assembler.with_progress(Arc::new(BarProgress::new()))
        } else {
            assembler
        };

        Ok(Self {
            logging_guard,
            assembler,
            provider,
            only_cached: args.only_cached,
        })
    }

    /// Closes the fetcher, removing a temporary cache.
    pub fn finish(self) -> Result<(), CliError> {
        info!(stats = %self.assembler.fetcher().stats(), "Done");
        self.assembler.fetcher().close()?;
        Ok(())
    }
}

async fn build_registry(client: &AsyncReqwestClient, discover: bool) -> ProviderRegistry {
    if !discover {
        return ProviderRegistry::builtin();
    }
    match discover_google_versions(client).await {
        Ok(versions) => ProviderRegistry::with_google_versions(&versions),
        Err(e) => {
            warn!(error = %e, "Google version discovery failed, using built-in versions");
            ProviderRegistry::builtin()
        }
    }
}

fn with_params(provider: Arc<dyn TileProvider>, args: &FetchArgs) -> Arc<dyn TileProvider> {
    let mut params = args.params.clone();
    if let Some(generation) = args.generation {
        params.push(("g".to_string(), generation.to_string()));
    }
    if params.is_empty() {
        return provider;
    }
    let query = params
        .into_iter()
        .fold(QueryProvider::new(provider), |q, (k, v)| q.param(k, v));
    Arc::new(query)
}

fn mosaic_config(config: &ConfigFile, args: &FetchArgs) -> MosaicConfig {
    let mut mosaic = config.mosaic_config();
    if args.sequential {
        mosaic.parallel = false;
    }
    if let Some(n) = args.concurrency {
        mosaic.max_concurrent = n.max(1);
    }
    if let Some(n) = args.batch_size {
        mosaic.batch_size = (n > 0).then_some(n);
    }
    if let Some(n) = args.max_tiles {
        mosaic.max_tiles = n;
    }
    mosaic
}

/// Writes `image` to `output`, or as PNG to stdout.
pub fn write_image(image: &DynamicImage, output: Option<&PathBuf>) -> Result<(), CliError> {
    match output {
        Some(path) => {
            image.save(path).map_err(|e| CliError::Output {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
            info!(path = %path.display(), width = image.width(), height = image.height(), "Saved image");
            Ok(())
        }
        None => {
            let mut stdout = io::stdout().lock();
            if stdout.is_terminal() {
                return Err(CliError::TerminalOutput);
            }
            let mut buf = io::Cursor::new(Vec::new());
            image
                .write_to(&mut buf, ImageFormat::Png)
                .and_then(|_| stdout.write_all(buf.get_ref()).map_err(Into::into))
                .map_err(|e| CliError::Output {
                    path: "<stdout>".to_string(),
                    error: e.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("key=abc").unwrap(),
            ("key".to_string(), "abc".to_string())
        );
        assert_eq!(
            parse_param("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert_eq!(
            parse_param("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_parse_size_arg() {
        assert_eq!(parse_size_arg("1MB").unwrap(), 1 << 20);
        assert!(parse_size_arg("big").is_err());
    }

    #[derive(clap::Parser)]
    struct Fetch {
        #[command(flatten)]
        args: FetchArgs,
    }

    fn fetch_args(argv: &[&str]) -> FetchArgs {
        use clap::Parser;
        let argv = std::iter::once("fetch").chain(argv.iter().copied());
        Fetch::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_mosaic_config_overrides() {
        let config = ConfigFile::default();
        let mosaic = mosaic_config(&config, &fetch_args(&["--max-tiles", "64", "--sequential"]));
        assert_eq!(mosaic.max_tiles, 64);
        assert!(!mosaic.parallel);

        let mosaic = mosaic_config(&config, &fetch_args(&[]));
        assert_eq!(mosaic, config.mosaic_config());
    }

    #[test]
    fn test_zero_max_tiles_rejected() {
        use clap::Parser;
        assert!(Fetch::try_parse_from(["fetch", "--max-tiles", "0"]).is_err());
    }

    #[test]
    fn test_write_image_to_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("out.png");
        let image = DynamicImage::new_rgb8(3, 2);
        write_image(&image, Some(&path)).unwrap();
        let read = image::open(&path).unwrap();
        assert_eq!((read.width(), read.height()), (3, 2));
    }

    #[test]
    fn test_write_image_unknown_extension() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("out.unknown");
        let err = write_image(&DynamicImage::new_rgb8(1, 1), Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::Output { .. }));
    }
}
