//! Analysis configuration.
//!
//! `AnalysisConfig` is built once (from TOML, or the Mumbai defaults), validated,
//! optionally overridden from the environment, and then shared immutably by every
//! stage of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{BoundingBox, ErrorContext, PipelineError, PipelineResult, Statistic};
use crate::georef::calibration::{AqiBreakpoint, Calibration};
use crate::georef::resample::FallbackStatistic;
use crate::quality::FlagEncoding;
use crate::recommendations::rules::{default_rules, RecommendationRule};
use crate::scoring::buckets::{Bucket, BucketTable};
use crate::scoring::{Dimension, StatisticTransform};

/// Dataset names used by the default configuration.
pub mod datasets {
    pub const LAND_SURFACE_TEMPERATURE: &str = "land_surface_temperature";
    pub const NO2: &str = "no2";
    pub const PRECIPITATION: &str = "precipitation";
    pub const NDVI: &str = "ndvi";
    pub const HEALTH_FACILITIES: &str = "health_facilities";
}

/// Complete configuration for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub swath: SwathConfig,
    #[serde(default = "default_datasets")]
    pub datasets: BTreeMap<String, DatasetSpec>,
    #[serde(default = "default_dimensions")]
    pub dimensions: DimensionTables,
    #[serde(default = "default_rules")]
    pub rules: Vec<RecommendationRule>,
    /// Fixed "now" for window computation; wall-clock time when unset.
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,
}

/// Region of interest and output grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    #[serde(default = "default_region_name")]
    pub name: String,
    #[serde(default = "default_bounds")]
    pub bounds: BoundingBox,
    #[serde(default = "default_resolution_deg")]
    pub resolution_deg: f64,
    /// Margin added around the bounds when selecting source samples.
    #[serde(default = "default_padding_deg")]
    pub padding_deg: f64,
    /// Max distance from a projected sample to its nearest output cell centre.
    #[serde(default)]
    pub snap_tolerance_deg: Option<f64>,
}

impl RegionConfig {
    pub fn snap_tolerance(&self) -> f64 {
        self.snap_tolerance_deg
            .unwrap_or(self.resolution_deg * std::f64::consts::SQRT_2)
    }
}

fn default_region_name() -> String {
    "Mumbai".to_string()
}

fn default_bounds() -> BoundingBox {
    BoundingBox {
        north: 19.3,
        south: 18.8,
        east: 72.9,
        west: 72.7,
    }
}

fn default_resolution_deg() -> f64 {
    0.01
}

fn default_padding_deg() -> f64 {
    0.1
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: default_region_name(),
            bounds: default_bounds(),
            resolution_deg: default_resolution_deg(),
            padding_deg: default_padding_deg(),
            snap_tolerance_deg: None,
        }
    }
}

/// Acquisition fallback and concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Days subtracted from the reference time for each successive attempt.
    #[serde(default = "default_window_offsets")]
    pub window_offsets_days: Vec<u32>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_synthetic_seed")]
    pub synthetic_seed: u64,
}

impl AcquisitionConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_window_offsets() -> Vec<u32> {
    vec![0, 7, 14, 21, 28, 45, 60, 75, 90]
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    4
}

fn default_synthetic_seed() -> u64 {
    42
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            window_offsets_days: default_window_offsets(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            synthetic_seed: default_synthetic_seed(),
        }
    }
}

/// Quality-flag tolerance ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_min_tolerance")]
    pub min_tolerance: u8,
    #[serde(default = "default_max_tolerance")]
    pub max_tolerance: u8,
    #[serde(default = "default_true")]
    pub prefer_synthetic_on_insufficient: bool,
}

fn default_min_tolerance() -> u8 {
    1
}

fn default_max_tolerance() -> u8 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_tolerance: default_min_tolerance(),
            max_tolerance: default_max_tolerance(),
            prefer_synthetic_on_insufficient: true,
        }
    }
}

/// Inverse-distance weighting parameters for swath products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwathConfig {
    #[serde(default = "default_search_radius_deg")]
    pub search_radius_deg: f64,
    #[serde(default = "default_idw_power")]
    pub power: f64,
    #[serde(default)]
    pub fallback: FallbackStatistic,
}

fn default_search_radius_deg() -> f64 {
    0.05
}

fn default_idw_power() -> f64 {
    2.0
}

impl Default for SwathConfig {
    fn default() -> Self {
        Self {
            search_radius_deg: default_search_radius_deg(),
            power: default_idw_power(),
            fallback: FallbackStatistic::Mean,
        }
    }
}

/// Plausible interval for raw values (inclusive). Values outside are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidRange {
    pub min: f64,
    pub max: f64,
}

impl ValidRange {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Layout of data produced by the synthetic tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntheticLayout {
    Grid,
    Swath,
    Points,
}

/// Shape of the deterministic stand-in data for one dataset, in raw units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticProfile {
    pub layout: SyntheticLayout,
    pub base: f64,
    /// Half-width of the uniform noise added to every sample.
    pub variation: f64,
    /// Extra value at the region centre, fading linearly to zero at the edges.
    #[serde(default)]
    pub center_boost: f64,
    /// Samples per axis for grids, total samples for swaths and point sets.
    pub samples: usize,
}

/// Everything the pipeline needs to know about one named dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub unit: String,
    pub calibration: Calibration,
    pub valid_range: ValidRange,
    pub statistic: Statistic,
    #[serde(default)]
    pub neutral_statistic: f64,
    #[serde(default)]
    pub flag_encoding: FlagEncoding,
    pub min_valid_pixels: usize,
    pub synthetic: SyntheticProfile,
}

fn default_datasets() -> BTreeMap<String, DatasetSpec> {
    let mut map = BTreeMap::new();
    map.insert(
        datasets::LAND_SURFACE_TEMPERATURE.to_string(),
        DatasetSpec {
            unit: "celsius".to_string(),
            calibration: Calibration::KelvinToCelsius,
            valid_range: ValidRange {
                min: 200.0,
                max: 400.0,
            },
            statistic: Statistic::Mean,
            neutral_statistic: 32.0,
            flag_encoding: FlagEncoding::ModisLst,
            min_valid_pixels: 1000,
            synthetic: SyntheticProfile {
                layout: SyntheticLayout::Grid,
                base: 305.15,
                variation: 1.5,
                center_boost: 4.0,
                samples: 50,
            },
        },
    );
    map.insert(
        datasets::NO2.to_string(),
        DatasetSpec {
            unit: "aqi".to_string(),
            calibration: Calibration::No2ColumnToAqi {
                column_to_ugm3: 2.0e-14,
                concentration_cap: 200.0,
                breakpoints: AqiBreakpoint::indian_no2(),
            },
            valid_range: ValidRange {
                min: f64::MIN_POSITIVE,
                max: 1.0e17,
            },
            statistic: Statistic::Mean,
            neutral_statistic: 100.0,
            flag_encoding: FlagEncoding::Ordinal,
            min_valid_pixels: 5,
            synthetic: SyntheticProfile {
                layout: SyntheticLayout::Swath,
                base: 4.0e15,
                variation: 1.5e15,
                center_boost: 3.0e15,
                samples: 120,
            },
        },
    );
    map.insert(
        datasets::PRECIPITATION.to_string(),
        DatasetSpec {
            unit: "flood_risk_index".to_string(),
            calibration: Calibration::PrecipitationToFloodRisk { saturation_mm: 50.0 },
            valid_range: ValidRange {
                min: 0.0,
                max: 1000.0,
            },
            statistic: Statistic::Mean,
            neutral_statistic: 0.5,
            flag_encoding: FlagEncoding::Ordinal,
            min_valid_pixels: 10,
            synthetic: SyntheticProfile {
                layout: SyntheticLayout::Grid,
                base: 22.0,
                variation: 12.0,
                center_boost: 10.0,
                samples: 20,
            },
        },
    );
    map.insert(
        datasets::NDVI.to_string(),
        DatasetSpec {
            unit: "ndvi".to_string(),
            calibration: Calibration::Identity,
            valid_range: ValidRange {
                min: -1.0,
                max: 1.0,
            },
            statistic: Statistic::Mean,
            neutral_statistic: 0.3,
            flag_encoding: FlagEncoding::Ordinal,
            min_valid_pixels: 100,
            synthetic: SyntheticProfile {
                layout: SyntheticLayout::Grid,
                base: 0.38,
                variation: 0.15,
                center_boost: -0.2,
                samples: 50,
            },
        },
    );
    map.insert(
        datasets::HEALTH_FACILITIES.to_string(),
        DatasetSpec {
            unit: "facilities".to_string(),
            calibration: Calibration::Identity,
            valid_range: ValidRange { min: 0.0, max: 1.0e6 },
            statistic: Statistic::Count,
            neutral_statistic: 0.0,
            flag_encoding: FlagEncoding::Ordinal,
            min_valid_pixels: 1,
            synthetic: SyntheticProfile {
                layout: SyntheticLayout::Points,
                base: 1.0,
                variation: 0.0,
                center_boost: 0.0,
                samples: 60,
            },
        },
    );
    map
}

/// Scoring parameters for one resilience dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Dataset whose zone statistic feeds this dimension.
    pub dataset: String,
    pub buckets: BucketTable,
    #[serde(default = "default_neutral_score")]
    pub neutral_score: f64,
    #[serde(default)]
    pub transform: StatisticTransform,
}

fn default_neutral_score() -> f64 {
    50.0
}

/// Per-dimension tables. Every dimension must be present once a section is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionTables {
    #[serde(default)]
    pub air_quality: Option<DimensionSpec>,
    #[serde(default)]
    pub heat: Option<DimensionSpec>,
    #[serde(default)]
    pub flood: Option<DimensionSpec>,
    #[serde(default)]
    pub healthcare: Option<DimensionSpec>,
    #[serde(default)]
    pub green_space: Option<DimensionSpec>,
}

impl DimensionTables {
    pub fn get(&self, dimension: Dimension) -> Option<&DimensionSpec> {
        match dimension {
            Dimension::AirQuality => self.air_quality.as_ref(),
            Dimension::Heat => self.heat.as_ref(),
            Dimension::Flood => self.flood.as_ref(),
            Dimension::Healthcare => self.healthcare.as_ref(),
            Dimension::GreenSpace => self.green_space.as_ref(),
        }
    }
}

fn table(buckets: &[(f64, f64)], above: f64) -> BucketTable {
    BucketTable {
        buckets: buckets
            .iter()
            .map(|&(upper, score)| Bucket { upper, score })
            .collect(),
        above,
    }
}

fn default_dimensions() -> DimensionTables {
    DimensionTables {
        air_quality: Some(DimensionSpec {
            dataset: datasets::NO2.to_string(),
            buckets: table(
                &[(50.0, 100.0), (100.0, 80.0), (200.0, 50.0), (300.0, 20.0)],
                0.0,
            ),
            neutral_score: 50.0,
            transform: StatisticTransform::None,
        }),
        heat: Some(DimensionSpec {
            dataset: datasets::LAND_SURFACE_TEMPERATURE.to_string(),
            buckets: table(&[(30.0, 90.0), (35.0, 65.0), (40.0, 35.0)], 10.0),
            neutral_score: 50.0,
            transform: StatisticTransform::None,
        }),
        flood: Some(DimensionSpec {
            dataset: datasets::PRECIPITATION.to_string(),
            buckets: table(&[(0.25, 90.0), (0.5, 70.0), (0.75, 40.0)], 15.0),
            neutral_score: 50.0,
            transform: StatisticTransform::None,
        }),
        healthcare: Some(DimensionSpec {
            dataset: datasets::HEALTH_FACILITIES.to_string(),
            buckets: table(
                &[(0.05, 10.0), (0.2, 25.0), (0.5, 45.0), (1.0, 70.0)],
                90.0,
            ),
            neutral_score: 50.0,
            transform: StatisticTransform::PerThousandResidents,
        }),
        green_space: Some(DimensionSpec {
            dataset: datasets::NDVI.to_string(),
            buckets: table(
                &[(0.1, 10.0), (0.2, 30.0), (0.3, 50.0), (0.5, 75.0)],
                95.0,
            ),
            neutral_score: 50.0,
            transform: StatisticTransform::None,
        }),
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            region: RegionConfig::default(),
            acquisition: AcquisitionConfig::default(),
            quality: QualityConfig::default(),
            swath: SwathConfig::default(),
            datasets: default_datasets(),
            dimensions: default_dimensions(),
            rules: default_rules(),
            reference_time: None,
        }
    }
}

impl AnalysisConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(AnalysisConfig)` if the file parses and validates
    /// * `Err(PipelineError::Configuration)` otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::configuration_with_context(
                format!("Failed to read config file: {}", e),
                ErrorContext::new("load_config").with_entity_id(path.display()),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        let config: AnalysisConfig = toml::from_str(content).map_err(|e| {
            PipelineError::configuration_with_context(
                format!("Failed to parse config file: {}", e),
                ErrorContext::new("parse_config"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// First `resilience.toml` found in:
    /// 1. Current directory
    /// 2. `rust_backend/` directory
    /// 3. Parent directory
    pub fn find_default_location() -> Option<PathBuf> {
        [
            PathBuf::from("resilience.toml"),
            PathBuf::from("rust_backend/resilience.toml"),
            PathBuf::from("../resilience.toml"),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    /// Load configuration from the default location.
    pub fn from_default_location() -> PipelineResult<Self> {
        match Self::find_default_location() {
            Some(path) => Self::from_file(path),
            None => Err(PipelineError::configuration(
                "No resilience.toml found in standard locations",
            )),
        }
    }

    /// Apply `RESILIENCE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> PipelineResult<()> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (environment, CLI, tests).
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> PipelineResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RESILIENCE_MAX_CONCURRENCY") {
            self.acquisition.max_concurrency = parse_override("RESILIENCE_MAX_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("RESILIENCE_FETCH_TIMEOUT_SECS") {
            self.acquisition.fetch_timeout_secs =
                parse_override("RESILIENCE_FETCH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("RESILIENCE_SYNTHETIC_SEED") {
            self.acquisition.synthetic_seed = parse_override("RESILIENCE_SYNTHETIC_SEED", &v)?;
        }
        self.validate()
    }

    /// Look up a dataset, failing with a configuration error when unknown.
    pub fn dataset(&self, name: &str) -> PipelineResult<&DatasetSpec> {
        self.datasets.get(name).ok_or_else(|| {
            PipelineError::configuration_with_context(
                format!("unknown dataset '{}'", name),
                ErrorContext::new("lookup_dataset").with_entity("dataset"),
            )
        })
    }

    /// Scoring spec for a dimension; `validate` guarantees presence.
    pub fn dimension(&self, dimension: Dimension) -> PipelineResult<&DimensionSpec> {
        self.dimensions.get(dimension).ok_or_else(|| {
            PipelineError::configuration_with_context(
                format!("missing bucket table for dimension '{}'", dimension),
                ErrorContext::new("lookup_dimension").with_entity("bucket_table"),
            )
        })
    }

    /// Check every invariant the pipeline relies on.
    pub fn validate(&self) -> PipelineResult<()> {
        self.region.bounds.validate()?;
        if !(self.region.resolution_deg > 0.0) {
            return Err(PipelineError::configuration("region.resolution_deg must be positive"));
        }
        if !(self.region.padding_deg >= 0.0) {
            return Err(PipelineError::configuration("region.padding_deg must be non-negative"));
        }
        if let Some(tol) = self.region.snap_tolerance_deg {
            if !(tol > 0.0) {
                return Err(PipelineError::configuration(
                    "region.snap_tolerance_deg must be positive",
                ));
            }
        }
        if self.acquisition.window_offsets_days.is_empty() {
            return Err(PipelineError::configuration(
                "acquisition.window_offsets_days must not be empty",
            ));
        }
        if self.acquisition.max_concurrency == 0 {
            return Err(PipelineError::configuration(
                "acquisition.max_concurrency must be at least 1",
            ));
        }
        if self.acquisition.fetch_timeout_secs == 0 {
            return Err(PipelineError::configuration(
                "acquisition.fetch_timeout_secs must be at least 1",
            ));
        }
        if self.quality.min_tolerance > self.quality.max_tolerance || self.quality.max_tolerance > 3
        {
            return Err(PipelineError::configuration(format!(
                "quality tolerance ladder {}..={} must be ordered and within 0..=3",
                self.quality.min_tolerance, self.quality.max_tolerance
            )));
        }
        if !(self.swath.search_radius_deg > 0.0) || !(self.swath.power > 0.0) {
            return Err(PipelineError::configuration(
                "swath.search_radius_deg and swath.power must be positive",
            ));
        }

        for (name, spec) in &self.datasets {
            let ctx = || {
                ErrorContext::new("validate_config")
                    .with_entity("dataset")
                    .with_entity_id(name)
            };
            if !(spec.valid_range.min < spec.valid_range.max) {
                return Err(PipelineError::configuration_with_context(
                    "valid_range.min must be below valid_range.max",
                    ctx(),
                ));
            }
            spec.calibration
                .validate()
                .map_err(|msg| PipelineError::configuration_with_context(msg, ctx()))?;
        }

        for dimension in Dimension::ALL {
            let spec = self.dimension(dimension)?;
            let ctx = || {
                ErrorContext::new("validate_config")
                    .with_entity("bucket_table")
                    .with_entity_id(dimension)
            };
            spec.buckets
                .validate()
                .map_err(|msg| PipelineError::configuration_with_context(msg, ctx()))?;
            if !(0.0..=100.0).contains(&spec.neutral_score) {
                return Err(PipelineError::configuration_with_context(
                    format!("neutral_score {} outside [0,100]", spec.neutral_score),
                    ctx(),
                ));
            }
            if !self.datasets.contains_key(&spec.dataset) {
                return Err(PipelineError::configuration_with_context(
                    format!("dimension references unknown dataset '{}'", spec.dataset),
                    ctx(),
                ));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(PipelineError::configuration_with_context(
                    "duplicate rule id",
                    ErrorContext::new("validate_config")
                        .with_entity("rule")
                        .with_entity_id(&rule.id),
                ));
            }
            rule.validate().map_err(|msg| {
                PipelineError::configuration_with_context(
                    msg,
                    ErrorContext::new("validate_config")
                        .with_entity("rule")
                        .with_entity_id(&rule.id),
                )
            })?;
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> PipelineResult<T> {
    value.trim().parse::<T>().map_err(|_| {
        PipelineError::configuration_with_context(
            format!("cannot parse override value '{}'", value),
            ErrorContext::new("apply_env_overrides").with_entity_id(key),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.region.bounds.north, 19.3);
        assert_eq!(config.acquisition.window_offsets_days[0], 0);
        assert_eq!(config.acquisition.max_concurrency, 4);
        assert_eq!(config.datasets.len(), 5);
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config.region.resolution_deg, 0.01);
        assert_eq!(config.quality.max_tolerance, 3);
        assert!(config.dimensions.green_space.is_some());
    }

    #[test]
    fn test_partial_dimension_section_is_fatal() {
        let toml = r#"
[dimensions.heat]
dataset = "land_surface_temperature"
buckets = { buckets = [{ upper = 30.0, score = 90.0 }], above = 10.0 }
"#;
        let err = AnalysisConfig::from_toml_str(toml).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("missing bucket table"));
    }

    #[test]
    fn test_from_file_with_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[region]
name = "Test City"
resolution_deg = 0.02

[acquisition]
max_concurrency = 2
window_offsets_days = [0, 30]
"#
        )
        .unwrap();

        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.region.name, "Test City");
        assert_eq!(config.acquisition.max_concurrency, 2);
        assert_eq!(config.acquisition.window_offsets_days, vec![0, 30]);
        assert_eq!(config.acquisition.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = AnalysisConfig::from_file("/nonexistent/resilience.toml").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let mut config = AnalysisConfig::default();
        config
            .apply_overrides_from(|key| match key {
                "RESILIENCE_MAX_CONCURRENCY" => Some("8".to_string()),
                "RESILIENCE_SYNTHETIC_SEED" => Some(" 7 ".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.acquisition.max_concurrency, 8);
        assert_eq!(config.acquisition.synthetic_seed, 7);

        let err = config
            .apply_overrides_from(|key| {
                (key == "RESILIENCE_FETCH_TIMEOUT_SECS").then(|| "soon".to_string())
            })
            .unwrap_err();
        assert!(err.to_string().contains("RESILIENCE_FETCH_TIMEOUT_SECS"));
    }

    #[test]
    fn test_inverted_tolerance_rejected() {
        let mut config = AnalysisConfig::default();
        config.quality.min_tolerance = 3;
        config.quality.max_tolerance = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dimension_with_unknown_dataset_rejected() {
        let mut config = AnalysisConfig::default();
        if let Some(spec) = config.dimensions.heat.as_mut() {
            spec.dataset = "modis_lst_v7".to_string();
        }
        assert!(config.validate().is_err());
    }
}
