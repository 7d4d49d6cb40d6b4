//! File loading helpers for run inputs.
//!
//! Loaders return `anyhow::Result` with context describing which file and which
//! field failed; the pipeline itself only ever sees validated domain types.

pub mod zones;

pub use zones::{load_zones_geojson, parse_zones_geojson};
