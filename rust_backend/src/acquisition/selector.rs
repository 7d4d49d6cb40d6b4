//! Tiered acquisition: sources in tier order, each over successive time windows,
//! with synthetic data as the terminal step.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::source::{DatasetSource, FetchRequest, SourceError, TimeWindow};
use super::synthetic::SyntheticGenerator;
use crate::config::AnalysisConfig;
use crate::core::{BoundingBox, PipelineError, PipelineResult, Provenance, RawObservationGrid, SourceTier};
use crate::fallback::{Fallback, Step};
use crate::georef;
use crate::journal::{JournalLevel, RunJournal};

/// Rejection reason for a window the source had nothing for.
const EMPTY_WINDOW: &str = "no granule";

/// A source that was tried and did not deliver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRejection {
    pub source: String,
    pub tier: SourceTier,
    pub reason: String,
}

/// What the selector settled on for one dataset.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub grid: RawObservationGrid,
    pub provenance: Provenance,
    /// `None` for synthetic data.
    pub window_offset_days: Option<u32>,
    pub rejections: Vec<SourceRejection>,
}

impl Acquisition {
    pub fn strategy(&self) -> SourceTier {
        self.provenance.tier
    }
}

/// Whether any finite sample of `grid` lies inside `region`.
pub fn covers(grid: &RawObservationGrid, region: &BoundingBox) -> bool {
    (0..grid.len()).any(|i| {
        grid.value(i).is_finite()
            && georef::locate(grid, i).is_some_and(|(lat, lon)| region.contains(lat, lon))
    })
}

/// Picks the best available source for each dataset.
#[derive(Clone)]
pub struct AcquisitionSelector {
    sources: Vec<Arc<dyn DatasetSource>>,
    generator: SyntheticGenerator,
    config: Arc<AnalysisConfig>,
}

impl AcquisitionSelector {
    /// Sources are ordered by tier; registration order is kept within a tier.
    pub fn new(mut sources: Vec<Arc<dyn DatasetSource>>, config: Arc<AnalysisConfig>) -> Self {
        sources.sort_by_key(|s| s.tier());
        Self {
            sources,
            generator: SyntheticGenerator::new(config.acquisition.synthetic_seed),
            config,
        }
    }

    pub fn sources(&self) -> impl Iterator<Item = &dyn DatasetSource> {
        self.sources.iter().map(|s| s.as_ref())
    }

    /// Acquire `dataset` covering the last `days_back` days before `reference`.
    ///
    /// Never fails because of upstream trouble: exhausted tiers end in synthetic data.
    ///
    /// # Errors
    /// - [`PipelineError::Cancelled`] when `cancel` fired before a real source delivered
    /// - [`PipelineError::SyntheticGenerator`] when the terminal tier itself is broken
    pub async fn acquire(
        &self,
        dataset: &str,
        days_back: u32,
        reference: DateTime<Utc>,
        journal: &RunJournal,
        cancel: &CancellationToken,
    ) -> PipelineResult<Acquisition> {
        let padded = self
            .config
            .region
            .bounds
            .expanded(self.config.region.padding_deg);
        let chain = Fallback::new(0..self.sources.len());

        let outcome = chain
            .run_async(|index| {
                let source = Arc::clone(&self.sources[index]);
                async move {
                    self.try_source(source.as_ref(), dataset, days_back, reference, &padded, journal, cancel)
                        .await
                }
            })
            .await;

        let rejections: Vec<SourceRejection> = outcome
            .rejections
            .iter()
            .map(|r| SourceRejection {
                source: self.sources[r.step].name().to_string(),
                tier: self.sources[r.step].tier(),
                reason: r.reason.clone(),
            })
            .collect();

        if let Some((index, (offset, grid))) = outcome.accepted {
            let source = &self.sources[index];
            let provenance = Provenance::real(source.tier(), source.name());
            journal.record(
                JournalLevel::Success,
                Some(dataset),
                format!("acquired from {} ({} days back)", provenance, offset),
                json!({
                    "strategy": source.tier(),
                    "source": source.name(),
                    "window_offset_days": offset,
                    "provenance": provenance.kind,
                }),
            );
            let mut grid = grid;
            grid.provenance = provenance.clone();
            return Ok(Acquisition {
                grid,
                provenance,
                window_offset_days: Some(offset),
                rejections,
            });
        }

        if cancel.is_cancelled() {
            journal.warning(Some(dataset), "acquisition cancelled");
            return Err(PipelineError::Cancelled);
        }

        journal.record(
            JournalLevel::Warning,
            Some(dataset),
            "all real sources exhausted, using synthetic data",
            json!({ "strategy": SourceTier::Synthetic, "rejected_sources": rejections.len() }),
        );
        let grid = self.synthesize(dataset, reference)?;
        Ok(Acquisition {
            provenance: grid.provenance.clone(),
            grid,
            window_offset_days: None,
            rejections,
        })
    }

    /// Terminal tier: deterministic synthetic data for `dataset`.
    pub fn synthesize(&self, dataset: &str, reference: DateTime<Utc>) -> PipelineResult<RawObservationGrid> {
        let spec = self.config.dataset(dataset)?;
        self.generator.generate(
            dataset,
            spec,
            &self.config.region.bounds,
            self.config.region.padding_deg,
            reference,
        )
    }

    /// Walk the window offsets of one source.
    #[allow(clippy::too_many_arguments)]
    async fn try_source(
        &self,
        source: &dyn DatasetSource,
        dataset: &str,
        days_back: u32,
        reference: DateTime<Utc>,
        padded: &BoundingBox,
        journal: &RunJournal,
        cancel: &CancellationToken,
    ) -> Step<(u32, RawObservationGrid)> {
        let timeout = self.config.acquisition.fetch_timeout();
        // requests ask for the padded box, but a granule must reach the region itself
        let region = &self.config.region.bounds;
        let windows = Fallback::new(self.config.acquisition.window_offsets_days.iter().copied());

        let outcome = windows
            .run_async(|offset| async move {
                if cancel.is_cancelled() {
                    return Step::Abandon("cancelled".to_string());
                }
                let request = FetchRequest {
                    dataset: dataset.to_string(),
                    window: TimeWindow::ending_before(reference, offset, days_back),
                    region: *padded,
                };
                let result = match tokio::time::timeout(timeout, source.fetch(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(timeout)),
                };
                match result {
                    Ok(Some(grid)) => match grid.validate_shape() {
                        Err(e) => Step::reject(format!(
                            "{} days back: {}",
                            offset,
                            SourceError::Malformed(e.to_string())
                        )),
                        Ok(()) if covers(&grid, region) => Step::Accept(grid),
                        Ok(()) => Step::reject(format!("{} days back: no coverage of region", offset)),
                    },
                    Ok(None) => Step::reject(format!("{} days back: {}", offset, EMPTY_WINDOW)),
                    Err(e) if e.abandons_source() => Step::Abandon(e.to_string()),
                    Err(e) => Step::reject(format!("{} days back: {}", offset, e)),
                }
            })
            .await;

        for rejection in &outcome.rejections {
            log::debug!("[{}] {} window {}: {}", dataset, source.name(), rejection.step, rejection.reason);
        }

        match outcome.accepted {
            Some(found) => Step::Accept(found),
            None => {
                let reason = if outcome.abandoned {
                    outcome
                        .rejections
                        .last()
                        .map(|r| r.reason.clone())
                        .unwrap_or_else(|| "abandoned".to_string())
                } else {
                    let issue = outcome
                        .rejections
                        .iter()
                        .rev()
                        .find(|r| !r.reason.ends_with(EMPTY_WINDOW))
                        .or(outcome.rejections.last())
                        .map_or("none", |r| r.reason.as_str());
                    format!(
                        "no usable granule in {} windows (last issue: {})",
                        outcome.rejections.len(),
                        issue
                    )
                };
                journal.record(
                    JournalLevel::Warning,
                    Some(dataset),
                    format!("{} ({}) unavailable: {}", source.name(), source.tier(), reason),
                    json!({ "source": source.name(), "strategy": source.tier() }),
                );
                // a failing source only rules itself out; cancellation stops every tier
                if cancel.is_cancelled() {
                    Step::Abandon(reason)
                } else {
                    Step::reject(reason)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::local::LocalCacheSource;
    use crate::acquisition::source::SourceResult;
    use crate::config::datasets;
    use crate::core::{NativeLayout, PointSample, RegularLayout};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn points_at(dataset: &str, lat: f64, lon: f64, days_ago: i64) -> RawObservationGrid {
        RawObservationGrid::new(
            dataset,
            NativeLayout::Points(vec![PointSample { lat, lon, value: 1.0, flag: 0 }]),
            reference() - Duration::days(days_ago),
            Provenance::synthetic("fixture"),
        )
    }

    struct Failing {
        tier: SourceTier,
        error: SourceError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DatasetSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn tier(&self) -> SourceTier {
            self.tier
        }
        async fn fetch(&self, _request: &FetchRequest) -> SourceResult<Option<RawObservationGrid>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    /// Serves one fixed grid for every request.
    struct Serving {
        tier: SourceTier,
        grid: RawObservationGrid,
    }

    #[async_trait]
    impl DatasetSource for Serving {
        fn name(&self) -> &str {
            "serving"
        }
        fn tier(&self) -> SourceTier {
            self.tier
        }
        async fn fetch(&self, _request: &FetchRequest) -> SourceResult<Option<RawObservationGrid>> {
            Ok(Some(self.grid.clone()))
        }
    }

    fn short_flags_grid(dataset: &str, cols: usize) -> RawObservationGrid {
        RawObservationGrid::new(
            dataset,
            NativeLayout::Regular(RegularLayout {
                north: 19.1,
                west: 72.8,
                lat_step: 0.01,
                lon_step: 0.01,
                rows: 2,
                cols,
                values: vec![300.0; 4],
                flags: vec![0; 1],
            }),
            reference() - Duration::days(1),
            Provenance::synthetic("fixture"),
        )
    }

    fn failing(tier: SourceTier, error: SourceError) -> Arc<Failing> {
        Arc::new(Failing {
            tier,
            error,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_forbidden_source_falls_through_to_cache() {
        let forbidden = failing(SourceTier::TokenAuth, SourceError::Forbidden("403".into()));
        let cache = LocalCacheSource::new("cache").with_grid(points_at(datasets::NO2, 19.0, 72.8, 10));
        let sources: Vec<Arc<dyn DatasetSource>> = vec![Arc::new(cache), forbidden.clone()];
        let selector = AcquisitionSelector::new(sources, Arc::new(AnalysisConfig::default()));
        let journal = RunJournal::new();
        let acquisition = selector
            .acquire(datasets::NO2, 7, reference(), &journal, &CancellationToken::new())
            .await
            .unwrap();

        // forbidden abandons after a single window
        assert_eq!(forbidden.calls.load(Ordering::SeqCst), 1);
        assert_eq!(acquisition.strategy(), SourceTier::LocalCache);
        assert_eq!(acquisition.window_offset_days, Some(7));
        assert_eq!(acquisition.rejections.len(), 1);
        assert_eq!(acquisition.rejections[0].tier, SourceTier::TokenAuth);
        assert!(!acquisition.grid.provenance.is_synthetic());
    }

    #[tokio::test]
    async fn test_every_give_up_error_falls_through_to_next_tier() {
        let errors = [
            SourceError::Forbidden("403".into()),
            SourceError::Unauthorized("401".into()),
            SourceError::Network("connection reset".into()),
            SourceError::Timeout(std::time::Duration::from_secs(30)),
        ];
        for error in errors {
            let token = failing(SourceTier::TokenAuth, error.clone());
            let credentials = Arc::new(Serving {
                tier: SourceTier::CredentialAuth,
                grid: points_at(datasets::HEALTH_FACILITIES, 19.0, 72.8, 1),
            });
            let sources: Vec<Arc<dyn DatasetSource>> = vec![token.clone(), credentials];
            let selector = AcquisitionSelector::new(sources, Arc::new(AnalysisConfig::default()));
            let acquisition = selector
                .acquire(
                    datasets::HEALTH_FACILITIES,
                    30,
                    reference(),
                    &RunJournal::new(),
                    &CancellationToken::new(),
                )
                .await
                .unwrap();

            assert_eq!(token.calls.load(Ordering::SeqCst), 1, "{:?}", error);
            assert_eq!(acquisition.strategy(), SourceTier::CredentialAuth, "{:?}", error);
            assert_eq!(acquisition.window_offset_days, Some(0));
            assert_eq!(acquisition.rejections.len(), 1);
            assert_eq!(acquisition.rejections[0].reason, error.to_string());
        }
    }

    #[tokio::test]
    async fn test_malformed_shape_is_rejected_not_panicking() {
        for cols in [2, 0] {
            let cache = LocalCacheSource::new("cache")
                .with_grid(short_flags_grid(datasets::LAND_SURFACE_TEMPERATURE, cols));
            let sources: Vec<Arc<dyn DatasetSource>> = vec![Arc::new(cache)];
            let selector = AcquisitionSelector::new(sources, Arc::new(AnalysisConfig::default()));
            let acquisition = selector
                .acquire(
                    datasets::LAND_SURFACE_TEMPERATURE,
                    16,
                    reference(),
                    &RunJournal::new(),
                    &CancellationToken::new(),
                )
                .await
                .unwrap();

            assert!(acquisition.provenance.is_synthetic());
            assert_eq!(acquisition.rejections.len(), 1);
            assert!(acquisition.rejections[0].reason.contains("Malformed"));
        }
    }

    #[tokio::test]
    async fn test_granule_only_in_padding_is_rejected() {
        // inside the 0.1 degree margin north of the region, outside the region itself
        let cache = LocalCacheSource::new("cache")
            .with_grid(points_at(datasets::HEALTH_FACILITIES, 19.35, 72.8, 1));
        let sources: Vec<Arc<dyn DatasetSource>> = vec![Arc::new(cache)];
        let selector = AcquisitionSelector::new(sources, Arc::new(AnalysisConfig::default()));
        let acquisition = selector
            .acquire(
                datasets::HEALTH_FACILITIES,
                30,
                reference(),
                &RunJournal::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(acquisition.strategy(), SourceTier::Synthetic);
        assert!(acquisition.rejections[0].reason.contains("no coverage of region"));
    }

    #[tokio::test]
    async fn test_malformed_tries_every_window() {
        let malformed = failing(SourceTier::CredentialAuth, SourceError::Malformed("bad hdf".into()));
        let config = AnalysisConfig::default();
        let windows = config.acquisition.window_offsets_days.len();
        let sources: Vec<Arc<dyn DatasetSource>> = vec![malformed.clone()];
        let selector = AcquisitionSelector::new(sources, Arc::new(config));
        let acquisition = selector
            .acquire(datasets::NDVI, 16, reference(), &RunJournal::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(malformed.calls.load(Ordering::SeqCst), windows);
        assert!(acquisition.provenance.is_synthetic());
        assert_eq!(acquisition.window_offset_days, None);
    }

    #[tokio::test]
    async fn test_granule_outside_region_is_rejected() {
        let cache = LocalCacheSource::new("cache")
            .with_grid(points_at(datasets::HEALTH_FACILITIES, 28.6, 77.2, 1));
        let sources: Vec<Arc<dyn DatasetSource>> = vec![Arc::new(cache)];
        let selector = AcquisitionSelector::new(sources, Arc::new(AnalysisConfig::default()));
        let journal = RunJournal::new();
        let acquisition = selector
            .acquire(datasets::HEALTH_FACILITIES, 30, reference(), &journal, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(acquisition.strategy(), SourceTier::Synthetic);
        assert!(journal
            .for_dataset(datasets::HEALTH_FACILITIES)
            .iter()
            .any(|e| e.message.contains("synthetic")));
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let cache = LocalCacheSource::new("cache").with_grid(points_at(datasets::NO2, 19.0, 72.8, 1));
        let sources: Vec<Arc<dyn DatasetSource>> = vec![Arc::new(cache)];
        let selector = AcquisitionSelector::new(sources, Arc::new(AnalysisConfig::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = selector
            .acquire(datasets::NO2, 7, reference(), &RunJournal::new(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn test_sources_sorted_by_tier() {
        let sources: Vec<Arc<dyn DatasetSource>> = vec![
            Arc::new(LocalCacheSource::new("cache")),
            failing(SourceTier::CredentialAuth, SourceError::Network("down".into())),
            failing(SourceTier::TokenAuth, SourceError::Network("down".into())),
        ];
        let selector = AcquisitionSelector::new(sources, Arc::new(AnalysisConfig::default()));
        let tiers: Vec<_> = selector.sources().map(|s| s.tier()).collect();
        assert_eq!(
            tiers,
            vec![SourceTier::TokenAuth, SourceTier::CredentialAuth, SourceTier::LocalCache]
        );
    }
}
