//! Route geometry input
//!
//! Reads the `features[].geometry.coordinates` shape of a GeoJSON feature
//! collection. Each position is `[lon, lat]`, optionally followed by an
//! altitude that is ignored. Other members of the document are ignored.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// A `(lon, lat)` point in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePoint {
    pub lon: f64,
    pub lat: f64,
}

impl RoutePoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Ordered points of one traced route
pub type Route = Vec<RoutePoint>;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<Vec<f64>>,
}

/// Parse a route document from bytes
pub fn parse_routes(data: &[u8]) -> Result<Vec<Route>> {
    let collection: FeatureCollection =
        serde_json::from_slice(data).map_err(|e| Error::MalformedInput(e.to_string()))?;

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(feature_idx, feature)| {
            feature
                .geometry
                .coordinates
                .into_iter()
                .enumerate()
                .map(|(point_idx, position)| match position.as_slice() {
                    [lon, lat, ..] => Ok(RoutePoint::new(*lon, *lat)),
                    _ => Err(Error::MalformedInput(format!(
                        "feature {feature_idx}, point {point_idx}: expected [lon, lat], got {} value(s)",
                        position.len()
                    ))),
                })
                .collect::<Result<Route>>()
        })
        .collect()
}

/// Read and parse a route document from disk
pub fn read_routes(path: &Path) -> Result<Vec<Route>> {
    let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    parse_routes(&data).map_err(|e| match e {
        Error::MalformedInput(msg) => Error::MalformedInput(format!("{}: {msg}", path.display())),
        other => other,
    })
}
