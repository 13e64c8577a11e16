//! Batch cache builds
//!
//! Every user is an independent job: read the route document, build the
//! cache, write the artifact. Jobs run in parallel on a rayon pool and a
//! failing job never affects the others or the artifact already on disk
//! for that user.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::builder::CacheBuilder;
use crate::error::{Error, Result};
use crate::geojson::read_routes;
use crate::store::{artifact_path, write_artifact};

/// File extension of route documents picked up by [`discover_jobs`]
pub const GEOJSON_EXTENSION: &str = "geojson";

/// One user's build inputs and output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub user_id: String,
    pub geojson: PathBuf,
    pub artifact: PathBuf,
}

/// Per-job outcome of a batch build
#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One job per `<user>.geojson` in `geojson_dir`, sorted by user id
pub fn discover_jobs(geojson_dir: &Path, cache_dir: &Path) -> Result<Vec<BuildJob>> {
    let entries = std::fs::read_dir(geojson_dir).map_err(|e| Error::io(geojson_dir, e))?;

    let mut jobs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(geojson_dir, e))?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(GEOJSON_EXTENSION) {
            continue;
        }
        let Some(user_id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        jobs.push(BuildJob {
            user_id: user_id.to_string(),
            artifact: artifact_path(cache_dir, user_id),
            geojson: path.clone(),
        });
    }
    jobs.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    Ok(jobs)
}

/// Build and persist a single user's cache
pub fn run_job(builder: &CacheBuilder, job: &BuildJob) -> Result<()> {
    let start = Instant::now();
    let routes = read_routes(&job.geojson)?;
    let points: usize = routes.iter().map(Vec::len).sum();

    let cache = builder.build(&routes)?;
    write_artifact(&job.artifact, &cache)?;

    info!(
        user = %job.user_id,
        routes = routes.len(),
        points,
        artifact = %job.artifact.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built cache"
    );
    Ok(())
}

/// Run all jobs in parallel, calling `on_done` after each one
pub fn run_jobs<F>(builder: &CacheBuilder, jobs: &[BuildJob], on_done: F) -> BuildReport
where
    F: Fn(&BuildJob) + Sync,
{
    let outcomes: Vec<(String, Result<()>)> = jobs
        .par_iter()
        .map(|job| {
            let outcome = run_job(builder, job);
            if let Err(error) = &outcome {
                warn!(user = %job.user_id, %error, "cache build failed");
            }
            on_done(job);
            (job.user_id.clone(), outcome)
        })
        .collect();

    let mut report = BuildReport::default();
    for (user_id, outcome) in outcomes {
        match outcome {
            Ok(()) => report.built.push(user_id),
            Err(error) => report.failed.push((user_id, error)),
        }
    }
    report
}
