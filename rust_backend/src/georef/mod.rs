//! Georeferencing and resampling of raw grids into calibrated fields.
//!
//! A raw grid is turned into a [`CalibratedField`] in four steps:
//! 1. drop samples rejected by the quality mask,
//! 2. drop raw values outside the dataset's plausible range (never clamped),
//! 3. locate each sample geographically (sinusoidal inverse, regular grid, or as-is),
//! 4. calibrate and resample onto the region's [`TargetGrid`].

pub mod calibration;
pub mod grid;
pub mod resample;
pub mod sinusoidal;

use log::debug;

use crate::config::{AnalysisConfig, DatasetSpec};
use crate::core::{CalibratedField, FieldGeometry, NativeLayout, PipelineResult, RawObservationGrid};
use crate::quality::QualityMask;
use grid::TargetGrid;
use resample::{bin_points, interpolate_idw, rasterize, IdwParams, LocatedValue};

/// Geographic location of sample `index` in its native layout.
pub(crate) fn locate(raw: &RawObservationGrid, index: usize) -> Option<(f64, f64)> {
    match &raw.layout {
        NativeLayout::Regular(g) => Some(g.location(index)),
        NativeLayout::Sinusoidal(g) => {
            let row = index / g.cols;
            let col = index % g.cols;
            sinusoidal::pixel_location(g.tile, g.rows, g.cols, row, col)
        }
        NativeLayout::Swath(s) | NativeLayout::Points(s) => Some((s[index].lat, s[index].lon)),
    }
}

/// Valid, in-range, located and calibrated samples of a raw grid.
pub fn calibrated_samples(
    raw: &RawObservationGrid,
    mask: &QualityMask,
    spec: &DatasetSpec,
) -> Vec<LocatedValue> {
    let mut out_of_range = 0usize;
    let mut out_of_domain = 0usize;
    let mut samples = Vec::with_capacity(mask.accepted);

    for index in 0..raw.len() {
        if !mask.is_valid(index) {
            continue;
        }
        let value = raw.value(index);
        if !spec.valid_range.contains(value) {
            out_of_range += 1;
            continue;
        }
        match locate(raw, index) {
            Some((lat, lon)) => samples.push(LocatedValue {
                lat,
                lon,
                value: spec.calibration.apply(value),
            }),
            None => out_of_domain += 1,
        }
    }

    if out_of_range > 0 || out_of_domain > 0 {
        debug!(
            "'{}': discarded {} out-of-range and {} unlocatable samples",
            raw.dataset, out_of_range, out_of_domain
        );
    }
    samples
}

/// Convert a quality-masked raw grid into a calibrated field over the configured region.
pub fn georeference(
    raw: &RawObservationGrid,
    mask: &QualityMask,
    spec: &DatasetSpec,
    config: &AnalysisConfig,
) -> PipelineResult<CalibratedField> {
    raw.validate_shape()?;
    let target = TargetGrid::new(config.region.bounds, config.region.resolution_deg)?;
    let padded = config.region.bounds.expanded(config.region.padding_deg);
    let samples = calibrated_samples(raw, mask, spec);

    let (geometry, (cells, coverage)) = match &raw.layout {
        NativeLayout::Regular(_) | NativeLayout::Sinusoidal(_) => (
            FieldGeometry::Grid(target.clone()),
            rasterize(&target, &samples, &padded, config.region.snap_tolerance()),
        ),
        NativeLayout::Swath(_) => {
            let params = IdwParams {
                search_radius: config.swath.search_radius_deg,
                power: config.swath.power,
                fallback: config.swath.fallback,
            };
            (
                FieldGeometry::Grid(target.clone()),
                interpolate_idw(&target, &samples, &padded, params),
            )
        }
        NativeLayout::Points(_) => (FieldGeometry::Points, bin_points(&target, &samples)),
    };

    debug!(
        "'{}' ({} layout): {} samples -> {}/{} cells covered ({} low confidence)",
        raw.dataset,
        raw.layout.kind_name(),
        samples.len(),
        coverage.covered_cells,
        coverage.total_cells,
        coverage.low_confidence_cells
    );

    Ok(CalibratedField {
        dataset: raw.dataset.clone(),
        unit: spec.unit.clone(),
        geometry,
        cells,
        coverage,
        provenance: raw.provenance.clone(),
        captured_at: raw.captured_at,
    })
}
