//! End-to-end analysis runs.
//!
//! Each requested dataset runs its own acquisition, quality and georeferencing chain
//! concurrently (bounded by `acquisition.max_concurrency`). Once every chain has
//! finished, zonal aggregation, scoring and recommendation synthesis run over the
//! complete set of fields.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::acquisition::{AcquisitionSelector, DatasetSource, SourceRejection};
use crate::aggregation::aggregate;
use crate::config::{datasets, AnalysisConfig, DatasetSpec};
use crate::core::{
    CalibratedField, ErrorContext, PipelineError, PipelineResult, Provenance, RawObservationGrid,
    SourceTier, Zone, ZoneSummary,
};
use crate::georef::georeference;
use crate::journal::{JournalEntry, JournalLevel, RunJournal};
use crate::quality::{QualityFilter, QualityMask};
use crate::recommendations::{summarize_by_zone, synthesize, Recommendation, ZoneRecommendationSummary};
use crate::scoring::{city_score, composite_scores, score_zones, CityScore, ZoneComposite, ZoneScore};

/// One dataset to acquire and how far back to look.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRequest {
    pub name: String,
    pub days_back: u32,
}

impl DatasetRequest {
    pub fn new(name: impl Into<String>, days_back: u32) -> Self {
        Self {
            name: name.into(),
            days_back,
        }
    }

    /// Every built-in dataset with its usual look-back period.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(datasets::LAND_SURFACE_TEMPERATURE, 16),
            Self::new(datasets::NO2, 7),
            Self::new(datasets::PRECIPITATION, 30),
            Self::new(datasets::NDVI, 16),
            Self::new(datasets::HEALTH_FACILITIES, 365),
        ]
    }
}

/// How one dataset was obtained and how good it turned out to be.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub provenance: Provenance,
    pub strategy: SourceTier,
    pub window_offset_days: Option<u32>,
    /// Quality tolerance the mask settled on.
    pub qc_tolerance: u8,
    pub accepted_pixels: usize,
    /// The acquired grid fell short of the dataset's valid-pixel threshold.
    pub insufficient_coverage: bool,
    /// Replaced by synthetic data after the real grid failed quality control.
    pub resourced_synthetic: bool,
    pub coverage_fraction: f64,
    pub low_confidence_cells: usize,
    pub rejected_sources: Vec<SourceRejection>,
}

/// Everything one invocation produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRun {
    pub run_id: Uuid,
    pub region: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub reference_time: DateTime<Utc>,
    /// SHA-256 over the configuration, dataset requests and zones.
    pub input_checksum: String,
    pub datasets: Vec<DatasetReport>,
    pub zone_summaries: Vec<ZoneSummary>,
    pub zone_scores: Vec<ZoneScore>,
    pub zone_composites: Vec<ZoneComposite>,
    pub recommendations: Vec<Recommendation>,
    pub zone_recommendations: Vec<ZoneRecommendationSummary>,
    pub city: CityScore,
    pub journal: Vec<JournalEntry>,
}

impl AnalysisRun {
    pub fn report(&self, dataset: &str) -> Option<&DatasetReport> {
        self.datasets.iter().find(|r| r.dataset == dataset)
    }

    /// Whether any dataset ended up on synthetic data.
    pub fn uses_synthetic_data(&self) -> bool {
        self.datasets.iter().any(|r| r.provenance.is_synthetic())
    }
}

/// Hex SHA-256 of the run inputs.
pub fn input_checksum(
    config: &AnalysisConfig,
    requests: &[DatasetRequest],
    zones: &[Zone],
) -> PipelineResult<String> {
    let mut hasher = Sha256::new();
    let config_json = serde_json::to_vec(config)
        .map_err(|e| PipelineError::internal(format!("failed to serialize config: {}", e)))?;
    hasher.update(&config_json);
    for request in requests {
        hasher.update(request.name.as_bytes());
        hasher.update(request.days_back.to_le_bytes());
    }
    for zone in zones {
        hasher.update(zone.id.0.to_le_bytes());
        hasher.update(zone.name.as_bytes());
        hasher.update(zone.population.to_le_bytes());
        hasher.update(zone.area_km2.to_le_bytes());
        for polygon in &zone.boundary.0 {
            for coord in polygon.exterior().coords() {
                hasher.update(coord.x.to_le_bytes());
                hasher.update(coord.y.to_le_bytes());
            }
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// QC then georeference one raw grid. CPU-bound; run on the blocking pool.
fn process_grid(
    grid: &RawObservationGrid,
    spec: &DatasetSpec,
    config: &AnalysisConfig,
) -> PipelineResult<(QualityMask, CalibratedField)> {
    let mask = QualityFilter::for_dataset(spec, &config.quality).apply(grid);
    let field = georeference(grid, &mask, spec, config)?;
    Ok((mask, field))
}

async fn process_blocking(
    grid: RawObservationGrid,
    spec: DatasetSpec,
    config: Arc<AnalysisConfig>,
) -> PipelineResult<(QualityMask, CalibratedField)> {
    tokio::task::spawn_blocking(move || process_grid(&grid, &spec, &config)).await?
}

/// Shared state handed to every per-dataset task.
struct DatasetTask {
    selector: AcquisitionSelector,
    config: Arc<AnalysisConfig>,
    journal: RunJournal,
    cancel: CancellationToken,
    reference: DateTime<Utc>,
}

impl DatasetTask {
    /// Process one dataset, journalling the failure that ends the run.
    async fn run(&self, request: DatasetRequest) -> PipelineResult<(DatasetReport, CalibratedField)> {
        let name = request.name.clone();
        match self.acquire_and_process(request).await {
            Err(e) if !matches!(e, PipelineError::Cancelled) => {
                self.journal.record(
                    JournalLevel::Error,
                    Some(&name),
                    format!("dataset failed: {}", e),
                    serde_json::json!({ "context": e.context().map(|c| c.to_string()) }),
                );
                Err(e)
            }
            result => result,
        }
    }

    async fn acquire_and_process(
        &self,
        request: DatasetRequest,
    ) -> PipelineResult<(DatasetReport, CalibratedField)> {
        let name = request.name.as_str();
        let spec = self.config.dataset(name)?.clone();

        let acquisition = self
            .selector
            .acquire(name, request.days_back, self.reference, &self.journal, &self.cancel)
            .await?;
        let mut provenance = acquisition.provenance.clone();
        let (mut mask, mut field) =
            process_blocking(acquisition.grid, spec.clone(), Arc::clone(&self.config)).await?;

        let insufficient_coverage = mask.insufficient_coverage;
        let mut resourced_synthetic = false;
        if insufficient_coverage
            && !provenance.is_synthetic()
            && self.config.quality.prefer_synthetic_on_insufficient
        {
            self.journal.record(
                JournalLevel::Warning,
                Some(name),
                format!(
                    "{} valid pixels at tolerance {} is below {}, re-sourcing synthetic data",
                    mask.accepted, mask.tolerance, spec.min_valid_pixels
                ),
                serde_json::json!({ "replaced": provenance }),
            );
            let grid = self.selector.synthesize(name, self.reference)?;
            provenance = grid.provenance.clone();
            let (synthetic_mask, synthetic_field) =
                process_blocking(grid, spec.clone(), Arc::clone(&self.config)).await?;
            mask = synthetic_mask;
            field = synthetic_field;
            resourced_synthetic = true;
        } else if insufficient_coverage {
            self.journal.warning(
                Some(name),
                format!(
                    "insufficient quality coverage: {} valid pixels at tolerance {}",
                    mask.accepted, mask.tolerance
                ),
            );
        }

        let report = DatasetReport {
            dataset: request.name.clone(),
            strategy: provenance.tier,
            provenance,
            window_offset_days: if resourced_synthetic {
                None
            } else {
                acquisition.window_offset_days
            },
            qc_tolerance: mask.tolerance,
            accepted_pixels: mask.accepted,
            insufficient_coverage,
            resourced_synthetic,
            coverage_fraction: field.coverage.fraction(),
            low_confidence_cells: field.coverage.low_confidence_cells,
            rejected_sources: acquisition.rejections,
        };
        Ok((report, field))
    }
}

/// Configured pipeline with its registered data sources.
#[derive(Clone)]
pub struct AnalysisEngine {
    config: Arc<AnalysisConfig>,
    sources: Vec<Arc<dyn DatasetSource>>,
}

impl AnalysisEngine {
    /// Create an engine, validating the configuration up front.
    pub fn new(config: AnalysisConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            sources: Vec::new(),
        })
    }

    pub fn with_source(mut self, source: Arc<dyn DatasetSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Arc<dyn DatasetSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn validate_inputs(&self, requests: &[DatasetRequest], zones: &[Zone]) -> PipelineResult<()> {
        if zones.is_empty() {
            return Err(PipelineError::configuration("an analysis run needs at least one zone"));
        }
        let mut zone_ids = HashSet::new();
        for zone in zones {
            if !zone_ids.insert(zone.id) {
                return Err(PipelineError::invalid_zone("duplicate zone id", zone.id));
            }
        }
        let mut names = HashSet::new();
        for request in requests {
            if !names.insert(request.name.as_str()) {
                return Err(PipelineError::configuration_with_context(
                    "dataset requested twice",
                    ErrorContext::new("validate_inputs")
                        .with_entity("dataset")
                        .with_entity_id(&request.name),
                ));
            }
            self.config.dataset(&request.name)?;
        }
        Ok(())
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    /// - Configuration and invalid-zone errors before any work starts
    /// - [`PipelineError::Cancelled`] when `cancel` fires; partial results are discarded
    /// - [`PipelineError::SyntheticGenerator`] if the terminal tier fails
    /// - [`PipelineError::InvariantViolation`] for impossible scores
    pub async fn run_async(
        &self,
        requests: &[DatasetRequest],
        zones: &[Zone],
        cancel: CancellationToken,
    ) -> PipelineResult<AnalysisRun> {
        self.validate_inputs(requests, zones)?;

        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let reference = self.config.reference_time.unwrap_or(started_at);
        let journal = RunJournal::new();
        journal.info(
            None,
            format!(
                "run {} started: {} datasets over {} zones in {}",
                run_id,
                requests.len(),
                zones.len(),
                self.config.region.name
            ),
        );

        let task = Arc::new(DatasetTask {
            selector: AcquisitionSelector::new(self.sources.clone(), Arc::clone(&self.config)),
            config: Arc::clone(&self.config),
            journal: journal.clone(),
            cancel: cancel.clone(),
            reference,
        });
        let semaphore = Arc::new(Semaphore::new(self.config.acquisition.max_concurrency.max(1)));
        let mut set = JoinSet::new();
        for (index, request) in requests.iter().cloned().enumerate() {
            let task = Arc::clone(&task);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::internal(format!("semaphore closed: {}", e)))?;
                if task.cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                let result = task.run(request).await?;
                Ok::<_, PipelineError>((index, result))
            });
        }

        let mut results = Vec::with_capacity(requests.len());
        while let Some(joined) = set.join_next().await {
            let (index, (report, field)) = joined??;
            log::debug!(
                "'{}' ready: {} ({:.0}% coverage)",
                report.dataset,
                report.provenance,
                report.coverage_fraction * 100.0
            );
            results.push((index, report, field));
        }
        if cancel.is_cancelled() {
            journal.warning(None, "run cancelled, discarding partial results");
            return Err(PipelineError::Cancelled);
        }
        results.sort_by_key(|(index, _, _)| *index);
        let (reports, fields): (Vec<_>, Vec<_>) =
            results.into_iter().map(|(_, report, field)| (report, field)).unzip();

        let zone_summaries = aggregate(&fields, zones, &self.config)?;
        let zone_scores = score_zones(zones, &zone_summaries, &self.config)?;
        let zone_composites = composite_scores(zones, &zone_scores);
        let city = city_score(&zone_composites, &zone_scores)?;
        let recommendations = synthesize(zones, &zone_scores, &self.config.rules);
        let zone_recommendations = summarize_by_zone(zones, &recommendations);

        journal.success(
            None,
            format!(
                "city resilience {:.1} ({}), {} recommendations",
                city.score,
                city.status,
                recommendations.len()
            ),
        );

        Ok(AnalysisRun {
            run_id,
            region: self.config.region.name.clone(),
            started_at,
            completed_at: Utc::now(),
            reference_time: reference,
            input_checksum: input_checksum(&self.config, requests, zones)?,
            datasets: reports,
            zone_summaries,
            zone_scores,
            zone_composites,
            recommendations,
            zone_recommendations,
            city,
            journal: journal.entries(),
        })
    }

    /// Blocking form of [`run_async`](Self::run_async) on a private runtime.
    pub fn run(&self, requests: &[DatasetRequest], zones: &[Zone]) -> PipelineResult<AnalysisRun> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| PipelineError::internal(format!("failed to start runtime: {}", e)))?;
        runtime.block_on(self.run_async(requests, zones, CancellationToken::new()))
    }
}

/// Synchronous entry point: one run over `zones` with the given sources.
pub fn run_analysis(
    requests: &[DatasetRequest],
    zones: &[Zone],
    config: AnalysisConfig,
    sources: Vec<Arc<dyn DatasetSource>>,
) -> PipelineResult<AnalysisRun> {
    AnalysisEngine::new(config)?.with_sources(sources).run(requests, zones)
}
