//! Server state - coverage caches loaded at startup

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::store::{CacheRegistry, SkippedArtifact};

/// Leaf zoom served by the URL shape without an explicit leaf zoom
pub const LEGACY_LEAF_ZOOM: u8 = 14;

/// Read-only state shared by all handlers
#[derive(Debug, Default)]
pub struct ServerState {
    pub registry: CacheRegistry,
}

impl ServerState {
    pub fn new(registry: CacheRegistry) -> Self {
        Self { registry }
    }

    /// Load every artifact in `cache_dir`; corrupt ones are returned as skipped
    pub fn load(cache_dir: &Path) -> Result<(Self, Vec<SkippedArtifact>)> {
        let (registry, skipped) = CacheRegistry::load_dir(cache_dir)?;
        info!(
            users = registry.len(),
            skipped = skipped.len(),
            cache_dir = %cache_dir.display(),
            "loaded coverage caches"
        );
        Ok((Self::new(registry), skipped))
    }

    /// Leaf zoom used for a request that does not name one.
    ///
    /// `LEGACY_LEAF_ZOOM` if the user has it, otherwise the user's smallest
    /// leaf zoom. `None` for unknown users and users without levels.
    pub fn default_leaf_zoom(&self, user_id: &str) -> Option<u8> {
        let leaf_zooms = self.registry.get(user_id)?.leaf_zooms();
        if leaf_zooms.contains(&LEGACY_LEAF_ZOOM) {
            Some(LEGACY_LEAF_ZOOM)
        } else {
            leaf_zooms.first().copied()
        }
    }
}
