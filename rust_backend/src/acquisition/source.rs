//! Dataset source trait for abstracting upstream data providers.
//!
//! Each acquisition tier (token-authenticated API, credential-authenticated API, local
//! cache) implements [`DatasetSource`], so the selector can try them in order without
//! knowing how any of them talks to the outside world.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{BoundingBox, RawObservationGrid, SourceTier};

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Why a source could not serve a request.
///
/// Never escapes the acquisition selector: every variant is recovered by falling
/// back to the next window or the next tier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Whether the failure makes the remaining windows of this source pointless.
    pub fn abandons_source(&self) -> bool {
        !matches!(self, SourceError::Malformed(_))
    }
}

/// Half-open capture-time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The `days_back`-long window ending `offset_days` before `reference`.
    pub fn ending_before(reference: DateTime<Utc>, offset_days: u32, days_back: u32) -> Self {
        let end = reference - Duration::days(i64::from(offset_days));
        Self {
            start: end - Duration::days(i64::from(days_back.max(1))),
            end,
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time < self.end
    }
}

/// One fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub dataset: String,
    pub window: TimeWindow,
    /// Padded region of interest.
    pub region: BoundingBox,
}

/// An upstream provider of raw observation grids.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`: the engine shares sources across the
/// concurrent per-dataset acquisition tasks.
///
/// # Returns
/// - `Ok(Some(grid))` when a granule was found for the window
/// - `Ok(None)` when the source has nothing for the window
/// - `Err(SourceError)` when the source failed
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Human-readable source name, recorded in provenance tags.
    fn name(&self) -> &str;

    fn tier(&self) -> SourceTier;

    async fn fetch(&self, request: &FetchRequest) -> SourceResult<Option<RawObservationGrid>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_ending_before_reference() {
        let reference = Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap();
        let window = TimeWindow::ending_before(reference, 7, 30);
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 5, 24, 0, 0, 0).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 4, 24, 0, 0, 0).unwrap());
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
    }

    #[test]
    fn test_only_malformed_keeps_source_alive() {
        assert!(SourceError::Forbidden("403".into()).abandons_source());
        assert!(SourceError::Unauthorized("401".into()).abandons_source());
        assert!(SourceError::Network("reset".into()).abandons_source());
        assert!(SourceError::Timeout(std::time::Duration::from_secs(1)).abandons_source());
        assert!(!SourceError::Malformed("bad header".into()).abandons_source());
    }
}
