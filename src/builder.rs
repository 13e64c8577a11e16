//! Coverage cache builder
//!
//! Projects every route point onto the leaf grid of each configured leaf
//! zoom, finds the maximal covered squares, then folds every covered leaf
//! into the bitmask of each of its ancestors from `min_zoom` up to the leaf
//! level itself.
//!
//! Route points are taken as they are: consecutive points are not
//! interpolated, so a sparse trace leaves gaps between the tiles it
//! touches.

use std::collections::HashSet;

use tracing::debug;

use crate::config::BuildConfig;
use crate::coverage::{LevelCache, UserCache};
use crate::error::Result;
use crate::geojson::Route;
use crate::max_square::{max_squares, square_cells, MaxSquare};
use crate::tile::{
    ancestor_of, descendants_per_axis, leaf_index_within_ancestor, project_to_tile, TileCoordinate,
};

/// Result of building one leaf zoom level
#[derive(Debug, Clone)]
pub struct LevelBuild {
    pub cache: LevelCache,
    /// Distinct leaf tiles touched by the routes
    pub covered_tiles: usize,
    /// All maximal covered squares at this level
    pub max_squares: Vec<MaxSquare>,
}

/// Builds a `UserCache` from route geometry
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    config: BuildConfig,
}

impl CacheBuilder {
    pub fn new(mut config: BuildConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build every configured leaf zoom level.
    ///
    /// Fails with `EmptyCoverage` if the routes hold no points; nothing is
    /// returned unless every level succeeded.
    pub fn build(&self, routes: &[Route]) -> Result<UserCache> {
        let mut user_cache = UserCache::new();
        for &leaf_zoom in &self.config.leaf_zooms {
            let level = self.build_level(routes, leaf_zoom)?;
            debug!(
                leaf_zoom,
                covered_tiles = level.covered_tiles,
                records = level.cache.len(),
                max_square_size = level.max_squares.first().map(|s| s.size).unwrap_or(0),
                max_square_count = level.max_squares.len(),
                "built level"
            );
            user_cache.insert(level.cache);
        }
        Ok(user_cache)
    }

    /// Build a single leaf zoom level
    pub fn build_level(&self, routes: &[Route], leaf_zoom: u8) -> Result<LevelBuild> {
        let covered = covered_tiles(routes, leaf_zoom)?;
        let squares = max_squares(&covered)?;
        let in_square = square_cells(&squares);

        let mut cache = LevelCache::new(leaf_zoom);
        for &(x, y) in &covered {
            let leaf = TileCoordinate::new(x, y, leaf_zoom);
            let emphasised = in_square.contains(&(x, y));

            for zoom in self.config.min_zoom..=leaf_zoom {
                let ancestor = ancestor_of(&leaf, leaf_zoom, zoom)?;
                let idx = leaf_index_within_ancestor(&leaf, &ancestor, leaf_zoom, zoom)?;
                let side = descendants_per_axis(leaf_zoom, zoom)?;
                cache.record_mut(ancestor, side).mark(idx, emphasised);
            }
        }

        Ok(LevelBuild {
            cache,
            covered_tiles: covered.len(),
            max_squares: squares,
        })
    }
}

/// Distinct leaf tiles `(x, y)` touched by any route point at `zoom`
pub fn covered_tiles(routes: &[Route], zoom: u8) -> Result<HashSet<(u32, u32)>> {
    let mut covered = HashSet::new();
    for point in routes.iter().flatten() {
        let tile = project_to_tile(point.lon, point.lat, zoom)?;
        covered.insert((tile.x, tile.y));
    }
    Ok(covered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::geojson::RoutePoint;

    fn builder(leaf_zooms: Vec<u8>) -> CacheBuilder {
        CacheBuilder::new(BuildConfig::new(leaf_zooms, 8).unwrap()).unwrap()
    }

    fn sample_routes() -> Vec<Route> {
        vec![
            vec![
                RoutePoint::new(4.3517, 50.8503),
                RoutePoint::new(4.3527, 50.8513),
                RoutePoint::new(4.4025, 51.2194),
            ],
            vec![RoutePoint::new(-0.1276, 51.5072), RoutePoint::new(2.3522, 48.8566)],
        ]
    }

    #[test]
    fn test_origin_end_to_end() {
        let routes = vec![vec![RoutePoint::new(0.0, 0.0)]];
        let level = builder(vec![14]).build_level(&routes, 14).unwrap();

        assert_eq!(level.covered_tiles, 1);
        assert_eq!(level.max_squares, vec![MaxSquare::new(8192, 8192, 1)]);

        let ancestor = level.cache.get(&TileCoordinate::new(128, 128, 8)).unwrap();
        assert_eq!(ancestor.side(), 64);
        assert_eq!(ancestor.covered_count(), 1);
        assert!(ancestor.is_covered(0));
        assert!(ancestor.in_max_square(0));

        // one record per zoom from 8 to 14
        assert_eq!(level.cache.len(), 7);
    }

    #[test]
    fn test_every_ancestor_bit_is_set() {
        let routes = sample_routes();
        let builder = builder(vec![14, 16]);
        let cache = builder.build(&routes).unwrap();

        for leaf_zoom in [14u8, 16] {
            let level = cache.level(leaf_zoom).unwrap();
            for (x, y) in covered_tiles(&routes, leaf_zoom).unwrap() {
                let leaf = TileCoordinate::new(x, y, leaf_zoom);
                for zoom in 8..=leaf_zoom {
                    let ancestor = ancestor_of(&leaf, leaf_zoom, zoom).unwrap();
                    let idx = leaf_index_within_ancestor(&leaf, &ancestor, leaf_zoom, zoom).unwrap();
                    let record = level.get(&ancestor).unwrap();
                    assert!(record.is_covered(idx), "{leaf} missing under {ancestor}");
                }
            }
        }
    }

    #[test]
    fn test_max_square_is_subset_of_tiles() {
        let cache = builder(vec![14, 15, 16]).build(&sample_routes()).unwrap();
        for level in cache.levels() {
            for (_, record) in level.records() {
                assert!(record.is_consistent());
            }
        }
    }

    #[test]
    fn test_max_square_bits_mark_only_the_square() {
        // 2x2 block at zoom 10 plus one isolated tile
        let zoom = 10u8;
        let center = |x: u32, y: u32| {
            let n = f64::from(1u32 << zoom);
            let lon = (f64::from(x) + 0.5) / n * 360.0 - 180.0;
            let lat_rad = (std::f64::consts::PI * (1.0 - 2.0 * (f64::from(y) + 0.5) / n))
                .sinh()
                .atan();
            RoutePoint::new(lon, lat_rad.to_degrees())
        };
        let routes = vec![vec![
            center(500, 300),
            center(501, 300),
            center(500, 301),
            center(501, 301),
            center(520, 320),
        ]];

        let builder = CacheBuilder::new(BuildConfig::new(vec![zoom], 8).unwrap()).unwrap();
        let level = builder.build_level(&routes, zoom).unwrap();
        assert_eq!(level.max_squares, vec![MaxSquare::new(500, 300, 2)]);

        // zoom 8 ancestor of (500, 300) is (125, 75); 4x4 grid
        let record = level.cache.get(&TileCoordinate::new(125, 75, 8)).unwrap();
        assert_eq!(record.covered_count(), 4);
        assert!(record.in_max_square(0));
        assert!(record.in_max_square(1));
        assert!(record.in_max_square(4));
        assert!(record.in_max_square(5));

        let isolated = level.cache.get(&TileCoordinate::new(520, 320, 10)).unwrap();
        assert!(isolated.is_covered(0));
        assert!(!isolated.in_max_square(0));
    }

    #[test]
    fn test_duplicate_points_collapse() {
        let routes = vec![
            vec![RoutePoint::new(4.3517, 50.8503); 10],
            vec![RoutePoint::new(4.3517, 50.8503)],
        ];
        let level = builder(vec![14]).build_level(&routes, 14).unwrap();
        assert_eq!(level.covered_tiles, 1);
    }

    #[test]
    fn test_no_points_is_empty_coverage() {
        let routes: Vec<Route> = vec![vec![]];
        assert!(matches!(
            builder(vec![14]).build(&routes),
            Err(Error::EmptyCoverage)
        ));
    }
}
