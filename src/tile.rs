//! Slippy-map tile math
//!
//! Conversions between geographic coordinates and Web Mercator tile indices,
//! and the quad-tree relationship between a leaf tile and its ancestors.

use std::f64::consts::PI;

use serde::Serialize;

use crate::error::{Error, Result};

/// Highest zoom level accepted anywhere (2^24 tiles per axis fits in `u32`)
pub const MAX_ZOOM: u8 = 24;

/// Web Mercator latitude limit in degrees
pub const MAX_LAT: f64 = 85.051_128_78;

/// Tile index `(x, y)` at a zoom level, `0 <= x, y < 2^zoom`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoordinate {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Whether `x` and `y` address an existing tile at this zoom
    pub fn is_valid(&self) -> bool {
        if self.zoom > MAX_ZOOM {
            return false;
        }
        let n = tiles_per_axis(self.zoom);
        u64::from(self.x) < n && u64::from(self.y) < n
    }
}

impl std::fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one axis at `zoom`
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Side length, in leaf tiles, of an ancestor's descendant grid
///
/// Fails with `InvalidZoom` if the ancestor is finer than the leaf.
#[inline]
pub fn descendants_per_axis(leaf_zoom: u8, ancestor_zoom: u8) -> Result<u32> {
    if ancestor_zoom > leaf_zoom {
        return Err(Error::InvalidZoom(format!(
            "ancestor zoom {ancestor_zoom} is finer than leaf zoom {leaf_zoom}"
        )));
    }
    let gap = leaf_zoom - ancestor_zoom;
    if gap > MAX_ZOOM {
        return Err(Error::InvalidZoom(format!(
            "zoom gap {gap} exceeds maximum of {MAX_ZOOM}"
        )));
    }
    Ok(1u32 << gap)
}

/// Project a `(lon, lat)` point in degrees onto the tile grid at `zoom`.
///
/// Latitude is clamped to the Web Mercator range and the resulting indices
/// to the grid, so any finite input lands on a tile.
pub fn project_to_tile(lon: f64, lat: f64, zoom: u8) -> Result<TileCoordinate> {
    if zoom > MAX_ZOOM {
        return Err(Error::InvalidZoom(format!(
            "zoom {zoom} exceeds maximum of {MAX_ZOOM}"
        )));
    }
    if !lon.is_finite() || !lat.is_finite() {
        return Err(Error::MalformedInput(format!(
            "non-finite coordinate ({lon}, {lat})"
        )));
    }

    let n = tiles_per_axis(zoom) as f64;
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();

    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    let max_index = n - 1.0;
    Ok(TileCoordinate {
        x: x.clamp(0.0, max_index) as u32,
        y: y.clamp(0.0, max_index) as u32,
        zoom,
    })
}

/// North-west corner of a tile as `(lon, lat)` in degrees
pub fn tile_to_lon_lat(tile: &TileCoordinate) -> (f64, f64) {
    let n = tiles_per_axis(tile.zoom) as f64;
    let lon = f64::from(tile.x) / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * f64::from(tile.y) / n)).sinh().atan().to_degrees();
    (lon, lat)
}

/// Ancestor of a leaf tile at a coarser zoom
pub fn ancestor_of(tile: &TileCoordinate, leaf_zoom: u8, ancestor_zoom: u8) -> Result<TileCoordinate> {
    let n = descendants_per_axis(leaf_zoom, ancestor_zoom)?;
    Ok(TileCoordinate {
        x: tile.x / n,
        y: tile.y / n,
        zoom: ancestor_zoom,
    })
}

/// Row-major index of a leaf tile inside its ancestor's `n × n` grid.
///
/// `idx = (y - ancestor.y * n) * n + (x - ancestor.x * n)`. The renderer
/// decodes cells with the inverse mapping `x = idx % n`, `y = idx / n`.
pub fn leaf_index_within_ancestor(
    tile: &TileCoordinate,
    ancestor: &TileCoordinate,
    leaf_zoom: u8,
    ancestor_zoom: u8,
) -> Result<usize> {
    let n = descendants_per_axis(leaf_zoom, ancestor_zoom)?;
    let offset = |leaf: u32, anc: u32| anc.checked_mul(n).and_then(|base| leaf.checked_sub(base));
    let (dx, dy) = match (offset(tile.x, ancestor.x), offset(tile.y, ancestor.y)) {
        (Some(dx), Some(dy)) if dx < n && dy < n => (dx, dy),
        _ => {
            return Err(Error::InvalidZoom(format!(
                "tile {tile} is not a descendant of {ancestor}"
            )))
        }
    };
    Ok(dy as usize * n as usize + dx as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_at_zoom_14() {
        let tile = project_to_tile(0.0, 0.0, 14).unwrap();
        assert_eq!(tile, TileCoordinate::new(8192, 8192, 14));
    }

    #[test]
    fn test_new_york_city_at_zoom_16() {
        let tile = project_to_tile(-74.0060, 40.7128, 16).unwrap();
        assert_eq!(tile.x, 19295);
        assert_eq!(tile.y, 24640);
    }

    #[test]
    fn test_extremes_are_clamped_onto_grid() {
        let east = project_to_tile(180.0, 0.0, 10).unwrap();
        assert_eq!(east.x, 1023);

        let north = project_to_tile(0.0, 90.0, 10).unwrap();
        assert_eq!(north.y, 0);

        let south = project_to_tile(0.0, -90.0, 10).unwrap();
        assert_eq!(south.y, 1023);
        assert!(south.is_valid());
    }

    #[test]
    fn test_project_rejects_zoom_above_max() {
        assert!(matches!(
            project_to_tile(0.0, 0.0, MAX_ZOOM + 1),
            Err(Error::InvalidZoom(_))
        ));
    }

    #[test]
    fn test_project_rejects_nan() {
        assert!(matches!(
            project_to_tile(f64::NAN, 0.0, 10),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_tile_to_lon_lat_corner() {
        let (lon, lat) = tile_to_lon_lat(&TileCoordinate::new(8192, 8192, 14));
        assert!(lon.abs() < 1e-9);
        assert!(lat.abs() < 1e-9);
    }

    #[test]
    fn test_ancestor_of() {
        let leaf = TileCoordinate::new(8500, 5400, 14);
        let parent = ancestor_of(&leaf, 14, 8).unwrap();
        assert_eq!(parent, TileCoordinate::new(132, 84, 8));

        let same = ancestor_of(&leaf, 14, 14).unwrap();
        assert_eq!(same, leaf);
    }

    #[test]
    fn test_ancestor_of_rejects_finer_ancestor() {
        let leaf = TileCoordinate::new(1, 1, 10);
        assert!(matches!(
            ancestor_of(&leaf, 10, 11),
            Err(Error::InvalidZoom(_))
        ));
    }

    #[test]
    fn test_leaf_index_is_row_major() {
        // zoom gap 2 -> 4x4 grid under the ancestor (1, 1)
        let ancestor = TileCoordinate::new(1, 1, 8);
        let leaf = TileCoordinate::new(4 + 3, 4 + 2, 10);
        let idx = leaf_index_within_ancestor(&leaf, &ancestor, 10, 8).unwrap();
        assert_eq!(idx, 2 * 4 + 3);
    }

    #[test]
    fn test_leaf_index_rejects_foreign_tile() {
        let ancestor = TileCoordinate::new(1, 1, 8);
        let leaf = TileCoordinate::new(0, 0, 10);
        assert!(leaf_index_within_ancestor(&leaf, &ancestor, 10, 8).is_err());
    }
}
