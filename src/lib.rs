//! # Kachel
//!
//! Records which slippy-map tiles a user's GPS routes have touched and
//! serves that record back as transparent overlay tiles.
//!
//! A build projects every route point onto the Web Mercator tile grid at
//! one or more leaf zoom levels, finds the largest all-covered squares of
//! leaf tiles, and folds every covered leaf into a bitmask on each of its
//! ancestor tiles down to a minimum zoom. The result is persisted per user
//! and rendered on request into 256×256 PNG tiles.
//!
//! ```no_run
//! use kachel::{geojson, store, BuildConfig, CacheBuilder};
//! use std::path::Path;
//!
//! # fn main() -> kachel::Result<()> {
//! let routes = geojson::read_routes(Path::new("alice.geojson"))?;
//! let cache = CacheBuilder::new(BuildConfig::default())?.build(&routes)?;
//! store::write_artifact(Path::new("cache/alice.kachel"), &cache)?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod coverage;
pub mod error;
pub mod formats;
pub mod geojson;
pub mod logging;
pub mod max_square;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod store;
pub mod tile;

pub use builder::CacheBuilder;
pub use config::{BuildConfig, ServeConfig};
pub use coverage::{CoverageRecord, LevelCache, UserCache};
pub use error::{Error, Result};
pub use store::{CacheRegistry, Lookup};
pub use tile::TileCoordinate;
