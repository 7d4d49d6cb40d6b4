//! Point-in-polygon reduction of calibrated fields to per-zone statistics.
//!
//! Aggregation is a pure function of (field, zones, dataset spec): re-running it on
//! the same inputs yields identical summaries. Zones are processed in parallel and
//! the output keeps the input zone order.

use geo::{Contains, Point};
use log::debug;
use rayon::prelude::*;

use crate::config::{AnalysisConfig, DatasetSpec};
use crate::core::{CalibratedField, PipelineResult, Statistic, Zone, ZoneSummary};

/// Summarize one field for one zone.
pub fn summarize_zone(field: &CalibratedField, zone: &Zone, spec: &DatasetSpec) -> ZoneSummary {
    let mut count = 0usize;
    let mut low_confidence = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for cell in &field.cells {
        let Some(value) = cell.value else {
            continue;
        };
        if !zone.may_contain(cell.lat, cell.lon) {
            continue;
        }
        if !zone.boundary.contains(&Point::new(cell.lon, cell.lat)) {
            continue;
        }
        count += 1;
        if cell.low_confidence {
            low_confidence += 1;
        }
        sum += value;
        min = min.min(value);
        max = max.max(value);
    }

    let (mean, min, max) = if count > 0 {
        (Some(sum / count as f64), Some(min), Some(max))
    } else {
        (None, None, None)
    };

    let statistic = match (count, spec.statistic) {
        (0, _) => spec.neutral_statistic,
        (_, Statistic::Mean) => sum / count as f64,
        (_, Statistic::Min) => min.unwrap_or(spec.neutral_statistic),
        (_, Statistic::Max) => max.unwrap_or(spec.neutral_statistic),
        (_, Statistic::Count) => count as f64,
    };

    ZoneSummary {
        zone_id: zone.id,
        dataset: field.dataset.clone(),
        statistic_kind: spec.statistic,
        statistic,
        sample_count: count,
        low_confidence_samples: low_confidence,
        mean,
        min,
        max,
        provenance: field.provenance.clone(),
    }
}

/// Summarize one field for every zone, in zone order.
pub fn aggregate_field(
    field: &CalibratedField,
    zones: &[Zone],
    spec: &DatasetSpec,
) -> Vec<ZoneSummary> {
    zones
        .par_iter()
        .map(|zone| summarize_zone(field, zone, spec))
        .collect()
}

/// Summarize every field for every zone.
///
/// # Returns
/// Summaries grouped by field (in field order), each group in zone order.
pub fn aggregate(
    fields: &[CalibratedField],
    zones: &[Zone],
    config: &AnalysisConfig,
) -> PipelineResult<Vec<ZoneSummary>> {
    let mut summaries = Vec::with_capacity(fields.len() * zones.len());
    for field in fields {
        let spec = config.dataset(&field.dataset)?;
        let group = aggregate_field(field, zones, spec);
        let empty = group.iter().filter(|s| s.sample_count == 0).count();
        debug!(
            "aggregated '{}' over {} zones ({} without samples)",
            field.dataset,
            zones.len(),
            empty
        );
        summaries.extend(group);
    }
    Ok(summaries)
}
