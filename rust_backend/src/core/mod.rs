//! Core domain models for the resilience pipeline.
//!
//! This module defines the observation, geometry and zone types shared by every
//! stage, together with the crate-wide error taxonomy.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{ErrorContext, PipelineError, PipelineResult};
