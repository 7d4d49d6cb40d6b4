//! Per-sample quality-flag decoding and tolerance relaxation.

pub mod qc;

pub use qc::{FlagEncoding, QualityFilter, QualityMask};
