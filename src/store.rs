//! Artifact persistence and the server-side cache registry

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::coverage::{CoverageRecord, UserCache};
use crate::error::{Error, Result};
use crate::formats::coverage_cache;
use crate::tile::TileCoordinate;

/// File extension of cache artifacts
pub const ARTIFACT_EXTENSION: &str = "kachel";

/// Path of a user's artifact inside `cache_dir`
pub fn artifact_path(cache_dir: &Path, user_id: &str) -> PathBuf {
    cache_dir.join(format!("{user_id}.{ARTIFACT_EXTENSION}"))
}

/// User id of an artifact: the file name up to its first `.`
pub fn user_id_from_file_name(file_name: &str) -> Option<&str> {
    file_name.split('.').next().filter(|id| !id.is_empty())
}

/// Write a cache to `path` atomically.
///
/// The bytes go to a temporary file next to `path` which is then renamed
/// over it, so an existing artifact is either fully replaced or untouched.
pub fn write_artifact(path: &Path, cache: &UserCache) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let bytes = coverage_cache::save(cache);

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(&bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Read and decode one artifact
pub fn read_artifact(path: &Path) -> Result<UserCache> {
    let data = fs::read(path).map_err(|e| Error::io(path, e))?;
    coverage_cache::load(&data).map_err(|e| match e {
        Error::CorruptCache(msg) => Error::CorruptCache(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// An artifact that could not be loaded
#[derive(Debug)]
pub struct SkippedArtifact {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of a tile lookup
#[derive(Debug, PartialEq)]
pub enum Lookup<'a> {
    /// No cache for this user
    UnknownUser,
    /// The user has no cache for this leaf zoom
    UnknownLevel { available: Vec<u8> },
    /// Coverage for the tile; `None` means nothing covered
    Found(Option<&'a CoverageRecord>),
}

/// Read-only mapping from user id to cache, built once at startup
#[derive(Debug, Default)]
pub struct CacheRegistry {
    users: BTreeMap<String, UserCache>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user_id: impl Into<String>, cache: UserCache) {
        self.users.insert(user_id.into(), cache);
    }

    /// Load every artifact in `dir`.
    ///
    /// Unreadable or corrupt artifacts are logged and returned as skipped;
    /// they never prevent the remaining users from loading. Fails only if
    /// the directory itself cannot be listed.
    pub fn load_dir(dir: &Path) -> Result<(Self, Vec<SkippedArtifact>)> {
        let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

        let mut registry = Self::new();
        let mut skipped = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(user_id) = file_name.to_str().and_then(user_id_from_file_name) else {
                continue;
            };

            match read_artifact(&path) {
                Ok(cache) => {
                    info!(user = user_id, levels = ?cache.leaf_zooms(), "loaded cache");
                    registry.insert(user_id, cache);
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable cache artifact");
                    skipped.push(SkippedArtifact { path, error });
                }
            }
        }
        Ok((registry, skipped))
    }

    pub fn get(&self, user_id: &str) -> Option<&UserCache> {
        self.users.get(user_id)
    }

    /// Resolve the coverage of `tile` for a user at one leaf zoom
    pub fn lookup(&self, user_id: &str, leaf_zoom: u8, tile: &TileCoordinate) -> Lookup<'_> {
        let Some(cache) = self.users.get(user_id) else {
            return Lookup::UnknownUser;
        };
        let Some(level) = cache.level(leaf_zoom) else {
            return Lookup::UnknownLevel {
                available: cache.leaf_zooms(),
            };
        };
        Lookup::Found(level.get(tile))
    }

    /// User ids, sorted
    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    pub fn users(&self) -> impl Iterator<Item = (&str, &UserCache)> {
        self.users.iter().map(|(id, cache)| (id.as_str(), cache))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
