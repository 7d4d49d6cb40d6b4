//! Urban resilience analysis.
//!
//! Turns heterogeneous Earth-observation datasets into per-zone resilience scores and
//! ranked intervention recommendations for a city:
//!
//! 1. [`acquisition`]: tiered fetching with time-window and synthetic fallbacks
//! 2. [`quality`]: per-pixel quality masks with progressive tolerance relaxation
//! 3. [`georef`]: projection, calibration and resampling onto a common grid
//! 4. [`aggregation`]: zonal statistics over administrative polygons
//! 5. [`scoring`]: bucket-table scores per resilience dimension, composites and a city score
//! 6. [`recommendations`]: rule-driven, deduplicated and ranked interventions
//!
//! [`pipeline::AnalysisEngine`] wires the stages together; [`pipeline::run_analysis`] is
//! the blocking entry point.

pub mod acquisition;
pub mod aggregation;
pub mod config;
pub mod core;
pub mod fallback;
pub mod georef;
pub mod io;
pub mod journal;
pub mod pipeline;
pub mod quality;
pub mod recommendations;
pub mod scoring;

pub use config::AnalysisConfig;
pub use crate::core::{PipelineError, PipelineResult, Zone, ZoneId};
pub use pipeline::{run_analysis, AnalysisEngine, AnalysisRun, DatasetReport, DatasetRequest};
