//! Command-line interface for kachel
//!
//! Argument parsing and the glue between subcommands and the library.

pub mod progress;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use kachel::config::{BuildConfig, ServeConfig, DEFAULT_LEAF_ZOOMS, DEFAULT_MIN_ZOOM};
use kachel::pipeline::{discover_jobs, run_job, run_jobs, BuildJob};
use kachel::store::user_id_from_file_name;
use kachel::CacheBuilder;
use tracing::{error, info};

pub use progress::ProgressManager;

#[derive(Parser)]
#[command(name = "kachel")]
#[command(about = "Map-tile coverage caches and overlay tile server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build one user's coverage cache from a GeoJSON file
    Build {
        /// Route geometry (features[].geometry.coordinates)
        geojson: PathBuf,
        /// Cache artifact to write; the user id is the file name up to its first '.'
        output: PathBuf,
        #[command(flatten)]
        levels: LevelArgs,
    },
    /// Build caches for every <user>.geojson in a directory
    BuildAll {
        /// Directory of <user>.geojson files
        #[arg(long)]
        geojson_dir: PathBuf,
        /// Directory receiving <user>.kachel artifacts
        #[arg(long)]
        cache_dir: PathBuf,
        /// Worker threads (default: number of CPUs)
        #[arg(long)]
        threads: Option<usize>,
        #[command(flatten)]
        levels: LevelArgs,
    },
    /// Serve coverage tiles from a cache directory
    Serve {
        /// Directory of <user>.kachel artifacts
        #[arg(long)]
        cache_dir: PathBuf,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },
}

/// Zoom levels of a build
#[derive(Args, Debug, Clone)]
pub struct LevelArgs {
    /// Leaf zoom levels, comma-separated
    #[arg(long = "leaf-zoom", value_delimiter = ',', default_values_t = DEFAULT_LEAF_ZOOMS)]
    pub leaf_zooms: Vec<u8>,
    /// Coarsest ancestor zoom kept in the cache
    #[arg(long, default_value_t = DEFAULT_MIN_ZOOM)]
    pub min_zoom: u8,
}

impl LevelArgs {
    fn builder(&self) -> Result<CacheBuilder> {
        let config = BuildConfig::new(self.leaf_zooms.clone(), self.min_zoom)
            .context("invalid zoom levels")?;
        Ok(CacheBuilder::new(config)?)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            geojson,
            output,
            levels,
        } => build_one(&geojson, &output, &levels),
        Commands::BuildAll {
            geojson_dir,
            cache_dir,
            threads,
            levels,
        } => build_all(&geojson_dir, &cache_dir, threads, &levels),
        Commands::Serve {
            cache_dir,
            host,
            port,
        } => {
            let config = ServeConfig {
                cache_dir,
                addr: SocketAddr::new(host, port),
            };
            kachel::server::serve(&config).await
        }
    }
}

fn build_one(geojson: &Path, output: &Path, levels: &LevelArgs) -> Result<()> {
    let user_id = output
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(user_id_from_file_name)
        .with_context(|| format!("cannot derive a user id from {}", output.display()))?;

    let job = BuildJob {
        user_id: user_id.to_string(),
        geojson: geojson.to_path_buf(),
        artifact: output.to_path_buf(),
    };
    let builder = levels.builder()?;
    run_job(&builder, &job).with_context(|| format!("building cache for {user_id}"))?;
    Ok(())
}

fn build_all(
    geojson_dir: &Path,
    cache_dir: &Path,
    threads: Option<usize>,
    levels: &LevelArgs,
) -> Result<()> {
    let builder = levels.builder()?;
    std::fs::create_dir_all(cache_dir)
        .with_context(|| format!("creating {}", cache_dir.display()))?;

    let jobs = discover_jobs(geojson_dir, cache_dir)?;
    if jobs.is_empty() {
        bail!("no .geojson files in {}", geojson_dir.display());
    }

    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("creating worker pool")?;
    info!(
        users = jobs.len(),
        threads,
        leaf_zooms = ?builder.config().leaf_zooms,
        min_zoom = builder.config().min_zoom,
        "building caches"
    );

    let progress = ProgressManager::new(
        jobs.len() as u64,
        &format!("Building {} caches into {}", jobs.len(), cache_dir.display()),
    );
    let report = pool.install(|| run_jobs(&builder, &jobs, |job| progress.user_done(&job.user_id)));
    progress.finish(report.built.len(), report.failed.len());

    if !report.is_success() {
        for (user_id, e) in &report.failed {
            error!(user = %user_id, error = %e, "build failed");
        }
        bail!(
            "{} of {} users failed to build",
            report.failed.len(),
            jobs.len()
        );
    }
    Ok(())
}
