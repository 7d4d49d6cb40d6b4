//! Domain models for observations, calibrated fields and administrative zones.
//!
//! Raw grids are immutable once produced by the acquisition stage; calibrated
//! fields live only for the duration of a run. Zones are static reference data.

use chrono::{DateTime, Utc};
use geo::{BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{ErrorContext, PipelineError, PipelineResult};
use crate::georef::grid::TargetGrid;

/// Stable identifier of an administrative zone.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Geography
// =============================================================================

/// Geographic bounding box in decimal degrees (WGS84).
///
/// # Examples
///
/// ```
/// use urban_resilience::core::BoundingBox;
///
/// let mumbai = BoundingBox::new(19.3, 18.8, 72.9, 72.7).unwrap();
/// assert!(mumbai.contains(19.0, 72.8));
/// assert!(!mumbai.contains(19.0, 73.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Creates a bounding box, rejecting inverted or non-finite bounds.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> PipelineResult<Self> {
        let bbox = Self {
            north,
            south,
            east,
            west,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Checks ordering and the WGS84 domain.
    pub fn validate(&self) -> PipelineResult<()> {
        let finite = [self.north, self.south, self.east, self.west]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.north <= self.south || self.east <= self.west {
            return Err(PipelineError::configuration_with_context(
                format!(
                    "invalid bounding box N={} S={} E={} W={}",
                    self.north, self.south, self.east, self.west
                ),
                ErrorContext::new("validate_bounds").with_entity("region"),
            ));
        }
        if self.north > 90.0 || self.south < -90.0 || self.east > 180.0 || self.west < -180.0 {
            return Err(PipelineError::configuration(
                "bounding box exceeds the WGS84 domain",
            ));
        }
        Ok(())
    }

    /// Inclusive containment test.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Returns the box widened by `margin` degrees on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            north: (self.north + margin).min(90.0),
            south: (self.south - margin).max(-90.0),
            east: (self.east + margin).min(180.0),
            west: (self.west - margin).max(-180.0),
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    /// (lat, lon) of the box centre.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }
}

// =============================================================================
// Provenance
// =============================================================================

/// Acquisition tier, in the order the selector tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    TokenAuth,
    CredentialAuth,
    LocalCache,
    Synthetic,
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceTier::TokenAuth => "token_auth",
            SourceTier::CredentialAuth => "credential_auth",
            SourceTier::LocalCache => "local_cache",
            SourceTier::Synthetic => "synthetic",
        };
        f.write_str(s)
    }
}

/// Whether values came from an upstream source or the synthetic generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceKind {
    Real,
    Synthetic,
}

/// Provenance tag carried from acquisition through to scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub kind: ProvenanceKind,
    pub tier: SourceTier,
    pub source: String,
}

impl Provenance {
    pub fn real(tier: SourceTier, source: impl Into<String>) -> Self {
        Self {
            kind: ProvenanceKind::Real,
            tier,
            source: source.into(),
        }
    }

    pub fn synthetic(source: impl Into<String>) -> Self {
        Self {
            kind: ProvenanceKind::Synthetic,
            tier: SourceTier::Synthetic,
            source: source.into(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.kind == ProvenanceKind::Synthetic
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ProvenanceKind::Real => "real",
            ProvenanceKind::Synthetic => "synthetic",
        };
        write!(f, "{}:{}/{}", kind, self.tier, self.source)
    }
}

// =============================================================================
// Raw observations
// =============================================================================

/// MODIS sinusoidal tile index (`hHHvVV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModisTile {
    pub h: u8,
    pub v: u8,
}

impl ModisTile {
    pub fn new(h: u8, v: u8) -> Self {
        Self { h, v }
    }
}

impl fmt::Display for ModisTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{:02}v{:02}", self.h, self.v)
    }
}

/// North-up regular lat/lon grid. `north`/`west` locate the centre of the first cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularLayout {
    pub north: f64,
    pub west: f64,
    pub lat_step: f64,
    pub lon_step: f64,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
    pub flags: Vec<u8>,
}

impl RegularLayout {
    /// Centre (lat, lon) of the cell at `index` (row-major).
    pub fn location(&self, index: usize) -> (f64, f64) {
        let row = index / self.cols;
        let col = index % self.cols;
        (
            self.north - row as f64 * self.lat_step,
            self.west + col as f64 * self.lon_step,
        )
    }
}

/// One tile of a sinusoidal-projection product, row-major from the tile's top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinusoidalLayout {
    pub tile: ModisTile,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
    pub flags: Vec<u8>,
}

/// A single located sample (swath pixel or discrete detection).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSample {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
    pub flag: u8,
}

/// Native coordinate description of a raw grid, chosen at acquisition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum NativeLayout {
    Regular(RegularLayout),
    Sinusoidal(SinusoidalLayout),
    /// Irregular samples along a satellite ground track.
    Swath(Vec<PointSample>),
    /// Discrete detections (facilities, fire hotspots) that are counted, not interpolated.
    Points(Vec<PointSample>),
}

impl NativeLayout {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeLayout::Regular(_) => "regular",
            NativeLayout::Sinusoidal(_) => "sinusoidal",
            NativeLayout::Swath(_) => "swath",
            NativeLayout::Points(_) => "points",
        }
    }
}

/// Raw sensor values, per-sample quality flags and native coordinates for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservationGrid {
    pub dataset: String,
    pub layout: NativeLayout,
    pub captured_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl RawObservationGrid {
    pub fn new(
        dataset: impl Into<String>,
        layout: NativeLayout,
        captured_at: DateTime<Utc>,
        provenance: Provenance,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            layout,
            captured_at,
            provenance,
        }
    }

    /// Number of samples (pixels or points).
    pub fn len(&self) -> usize {
        match &self.layout {
            NativeLayout::Regular(g) => g.values.len(),
            NativeLayout::Sinusoidal(g) => g.values.len(),
            NativeLayout::Swath(s) | NativeLayout::Points(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw value of sample `index`.
    pub fn value(&self, index: usize) -> f64 {
        match &self.layout {
            NativeLayout::Regular(g) => g.values[index],
            NativeLayout::Sinusoidal(g) => g.values[index],
            NativeLayout::Swath(s) | NativeLayout::Points(s) => s[index].value,
        }
    }

    /// Quality flag of sample `index`.
    pub fn flag(&self, index: usize) -> u8 {
        match &self.layout {
            NativeLayout::Regular(g) => g.flags[index],
            NativeLayout::Sinusoidal(g) => g.flags[index],
            NativeLayout::Swath(s) | NativeLayout::Points(s) => s[index].flag,
        }
    }

    /// Checks that flag arrays match the value arrays and a non-empty declared shape.
    pub fn validate_shape(&self) -> PipelineResult<()> {
        let (rows, cols, values, flags) = match &self.layout {
            NativeLayout::Regular(g) => (g.rows, g.cols, g.values.len(), g.flags.len()),
            NativeLayout::Sinusoidal(g) => (g.rows, g.cols, g.values.len(), g.flags.len()),
            NativeLayout::Swath(_) | NativeLayout::Points(_) => return Ok(()),
        };
        if rows == 0 || cols == 0 || values != rows * cols || flags != values {
            return Err(PipelineError::invariant_with_context(
                format!(
                    "grid shape {}x{} does not match {} values / {} flags",
                    rows, cols, values, flags
                ),
                ErrorContext::new("validate_shape")
                    .with_entity("dataset")
                    .with_entity_id(&self.dataset),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Calibrated fields
// =============================================================================

/// One cell (or point) of a calibrated field, in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldCell {
    pub lat: f64,
    pub lon: f64,
    /// `None` when no valid value could be assigned.
    pub value: Option<f64>,
    /// Valid raw samples that contributed to this cell.
    pub sample_count: u32,
    /// Set when the value is a run-wide fallback rather than a local estimate.
    pub low_confidence: bool,
}

/// Target-grid coverage achieved by a calibrated field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coverage {
    pub covered_cells: usize,
    pub total_cells: usize,
    pub low_confidence_cells: usize,
}

impl Coverage {
    /// Proportion of target cells with at least one contributing sample.
    pub fn fraction(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.covered_cells as f64 / self.total_cells as f64
        }
    }
}

/// Spatial arrangement of a calibrated field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldGeometry {
    Grid(TargetGrid),
    Points,
}

/// Physical values covering the region of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedField {
    pub dataset: String,
    pub unit: String,
    pub geometry: FieldGeometry,
    pub cells: Vec<FieldCell>,
    pub coverage: Coverage,
    pub provenance: Provenance,
    pub captured_at: DateTime<Utc>,
}

impl CalibratedField {
    /// Cells that hold a usable value.
    pub fn valid_cells(&self) -> impl Iterator<Item = &FieldCell> {
        self.cells.iter().filter(|c| c.value.is_some())
    }

    pub fn is_point_set(&self) -> bool {
        matches!(self.geometry, FieldGeometry::Points)
    }
}

// =============================================================================
// Zones
// =============================================================================

/// Administrative subdivision (e.g. a city ward).
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub population: u64,
    pub area_km2: f64,
    pub boundary: MultiPolygon<f64>,
    bounds: Rect<f64>,
}

impl Zone {
    /// Builds a zone, validating its polygon and population.
    ///
    /// # Arguments
    /// * `id` - Stable zone identifier
    /// * `name` - Display name
    /// * `population` - Resident population (negative values are an invariant violation)
    /// * `area_km2` - Reported area
    /// * `boundary` - Zone outline in (lon, lat) coordinates
    ///
    /// # Returns
    /// * `Err(PipelineError::InvalidZone)` for empty, unclosed or non-finite rings
    /// * `Err(PipelineError::InvariantViolation)` for a negative population
    pub fn new(
        id: ZoneId,
        name: impl Into<String>,
        population: i64,
        area_km2: f64,
        boundary: MultiPolygon<f64>,
    ) -> PipelineResult<Self> {
        if population < 0 {
            return Err(PipelineError::invariant_with_context(
                format!("negative population {}", population),
                ErrorContext::new("validate_zone")
                    .with_entity("zone")
                    .with_entity_id(id),
            ));
        }
        if !area_km2.is_finite() || area_km2 < 0.0 {
            return Err(PipelineError::invalid_zone(
                format!("area must be a non-negative number, got {}", area_km2),
                id,
            ));
        }
        if boundary.0.is_empty() {
            return Err(PipelineError::invalid_zone("boundary has no polygons", id));
        }
        for polygon in &boundary.0 {
            validate_ring(polygon.exterior(), id)?;
            for interior in polygon.interiors() {
                validate_ring(interior, id)?;
            }
        }
        let bounds = boundary
            .bounding_rect()
            .ok_or_else(|| PipelineError::invalid_zone("boundary has no extent", id))?;

        Ok(Self {
            id,
            name: name.into(),
            population: population as u64,
            area_km2,
            boundary,
            bounds,
        })
    }

    /// Convenience constructor for an axis-aligned rectangular zone.
    pub fn rectangle(
        id: ZoneId,
        name: impl Into<String>,
        population: i64,
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    ) -> PipelineResult<Self> {
        let ring = LineString::from(vec![
            (west, south),
            (east, south),
            (east, north),
            (west, north),
            (west, south),
        ]);
        let area_km2 = approx_area_km2(south, west, north, east);
        Self::new(
            id,
            name,
            population,
            area_km2,
            MultiPolygon::new(vec![Polygon::new(ring, vec![])]),
        )
    }

    /// Bounding-rectangle pre-filter for containment tests.
    pub fn may_contain(&self, lat: f64, lon: f64) -> bool {
        let min: Coord<f64> = self.bounds.min();
        let max: Coord<f64> = self.bounds.max();
        lon >= min.x && lon <= max.x && lat >= min.y && lat <= max.y
    }
}

fn validate_ring(ring: &LineString<f64>, id: ZoneId) -> PipelineResult<()> {
    if ring.0.len() < 4 {
        return Err(PipelineError::invalid_zone(
            format!("ring has {} coordinates, need at least 4", ring.0.len()),
            id,
        ));
    }
    if !ring.is_closed() {
        return Err(PipelineError::invalid_zone("ring is not closed", id));
    }
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(PipelineError::invalid_zone("ring has non-finite coordinates", id));
    }
    Ok(())
}

/// Equirectangular area approximation, adequate at city scale.
fn approx_area_km2(south: f64, west: f64, north: f64, east: f64) -> f64 {
    const KM_PER_DEG: f64 = 111.32;
    let mid_lat = ((north + south) / 2.0).to_radians();
    (north - south) * KM_PER_DEG * (east - west) * KM_PER_DEG * mid_lat.cos()
}

// =============================================================================
// Zone statistics
// =============================================================================

/// Reduction applied to the samples inside a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Mean,
    Min,
    Max,
    Count,
}

/// Per-zone, per-dataset aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub zone_id: ZoneId,
    pub dataset: String,
    pub statistic_kind: Statistic,
    /// The selected statistic, or the dataset's neutral default when `sample_count == 0`.
    pub statistic: f64,
    pub sample_count: usize,
    pub low_confidence_samples: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub provenance: Provenance,
}
