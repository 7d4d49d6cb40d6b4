//! Zonal aggregation of calibrated fields.

pub mod zonal;

pub use zonal::{aggregate, aggregate_field, summarize_zone};
