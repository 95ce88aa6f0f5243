//! bingtiles CLI - fetch slippy-map tiles and build bounding-box mosaics.

mod commands;
mod error;
mod progress;

use std::future::Future;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::{load_config, FetchArgs, GlobalArgs};
use error::CliError;

#[derive(Parser)]
#[command(name = "bingtiles")]
#[command(version, about = "Fetch map tiles and stitch bounding-box mosaics", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the tile containing a point
    Tile {
        /// Latitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Build a mosaic of the box between two points
    Map {
        /// Latitude of the first corner
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Longitude of the first corner
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        /// Latitude of the second corner (omit both for the tiles around the first)
        #[arg(allow_negative_numbers = true)]
        lat2: Option<f64>,
        /// Longitude of the second corner
        #[arg(allow_negative_numbers = true)]
        lon2: Option<f64>,
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// List available tile providers; `*` marks the default
    Providers,

    /// Show what a tile cache holds
    Cache {
        /// Cache directory or .tar archive
        path: PathBuf,
    },
}

fn block_on<F: Future<Output = Result<(), CliError>>>(future: F) -> Result<(), CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?
        .block_on(future)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let global = cli.global;
    match cli.command {
        Commands::Tile { lat, lon, fetch } => {
            block_on(commands::tile::run(lat, lon, &global, &fetch))
        }
        Commands::Map {
            lat,
            lon,
            lat2,
            lon2,
            fetch,
        } => {
            let request = commands::map::request(lat, lon, lat2, lon2, fetch.lod)?;
            block_on(commands::map::run(request, &global, &fetch))
        }
        Commands::Providers => {
            let config = load_config(&global)?;
            commands::providers::run(&config.provider.name)
        }
        Commands::Cache { path } => block_on(commands::cache::run(&path)),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}
