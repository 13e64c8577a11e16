//! Error types for kachel
//!
//! Build-time failures (`MalformedInput`, `EmptyCoverage`) abort a single
//! user's build. `CorruptCache` is raised while loading artifacts and is
//! recovered by the registry loader, which skips the offending user.

use std::path::PathBuf;

/// Main error type for kachel operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Zoom levels that cannot be related the requested way
    #[error("Invalid zoom: {0}")]
    InvalidZoom(String),

    /// Route geometry is missing required fields or holds non-numeric values
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Max-square computation or a build was given no covered tiles
    #[error("No covered tiles: the route geometry contains no points")]
    EmptyCoverage,

    /// Persisted artifact cannot be deserialized
    #[error("Corrupt cache: {0}")]
    CorruptCache(String),

    /// Invalid build or serve configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PNG encoding failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result type for kachel operations
pub type Result<T> = std::result::Result<T, Error>;
