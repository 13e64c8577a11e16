//! # Kachel CLI
//!
//! Builds per-user coverage caches from GeoJSON route files and serves
//! them as transparent overlay tiles.

use clap::Parser;
use tracing::error;

mod cli;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    kachel::logging::init_logging(cli.verbose);

    if let Err(e) = cli::run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}
