//! Tiered acquisition of raw observation grids.
//!
//! Upstream providers implement [`DatasetSource`]; the [`AcquisitionSelector`] tries
//! them in tier order over successive time windows and falls back to the
//! [`SyntheticGenerator`] when every real source is exhausted.

pub mod local;
pub mod selector;
pub mod source;
pub mod synthetic;

pub use local::LocalCacheSource;
pub use selector::{covers, Acquisition, AcquisitionSelector, SourceRejection};
pub use source::{DatasetSource, FetchRequest, SourceError, SourceResult, TimeWindow};
pub use synthetic::{SyntheticGenerator, SYNTHETIC_SOURCE};
