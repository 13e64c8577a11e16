//! Build and serve configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::tile::MAX_ZOOM;

/// Leaf zoom levels built when none are given
pub const DEFAULT_LEAF_ZOOMS: [u8; 3] = [14, 15, 16];

/// Coarsest ancestor zoom stored in the cache
pub const DEFAULT_MIN_ZOOM: u8 = 8;

/// Largest leaf/ancestor gap such that a leaf cell is at least one pixel
/// in a 256-pixel tile
pub const MAX_ZOOM_GAP: u8 = 8;

/// Which levels the cache builder produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Leaf zoom levels, ascending and deduplicated after `validate`
    pub leaf_zooms: Vec<u8>,
    /// Coarsest ancestor zoom
    pub min_zoom: u8,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            leaf_zooms: DEFAULT_LEAF_ZOOMS.to_vec(),
            min_zoom: DEFAULT_MIN_ZOOM,
        }
    }
}

impl BuildConfig {
    pub fn new(leaf_zooms: Vec<u8>, min_zoom: u8) -> Result<Self> {
        let mut config = Self {
            leaf_zooms,
            min_zoom,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sort and deduplicate leaf zooms and check every level is buildable
    pub fn validate(&mut self) -> Result<()> {
        self.leaf_zooms.sort_unstable();
        self.leaf_zooms.dedup();

        if self.leaf_zooms.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one leaf zoom level is required".to_string(),
            ));
        }

        for &leaf in &self.leaf_zooms {
            if leaf > MAX_ZOOM {
                return Err(Error::InvalidZoom(format!(
                    "leaf zoom {leaf} exceeds maximum of {MAX_ZOOM}"
                )));
            }
            if leaf < self.min_zoom {
                return Err(Error::InvalidZoom(format!(
                    "leaf zoom {leaf} is coarser than min zoom {}",
                    self.min_zoom
                )));
            }
            if leaf - self.min_zoom > MAX_ZOOM_GAP {
                return Err(Error::InvalidZoom(format!(
                    "leaf zoom {leaf} is more than {MAX_ZOOM_GAP} levels below min zoom {}",
                    self.min_zoom
                )));
            }
        }
        Ok(())
    }
}

/// Tile server settings
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Directory holding one artifact per user
    pub cache_dir: PathBuf,
    /// Address to bind
    pub addr: SocketAddr,
}
