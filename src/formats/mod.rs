//! Binary file formats

pub mod coverage_cache;
pub mod crc;

pub use coverage_cache::{load, save};
