//! Zone and city scoring.

use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

use super::{
    CityScore, CityStatus, Dimension, ScoreBasis, StatisticTransform, ZoneComposite, ZoneScore,
};
use crate::config::{AnalysisConfig, DimensionSpec};
use crate::core::{
    ErrorContext, PipelineError, PipelineResult, Statistic, Zone, ZoneId, ZoneSummary,
};

fn fallback_score(
    zone: &Zone,
    dimension: Dimension,
    spec: &DimensionSpec,
    summary: Option<&ZoneSummary>,
) -> ZoneScore {
    ZoneScore {
        zone_id: zone.id,
        dimension,
        score: spec.neutral_score,
        raw_statistic: summary.map(|s| s.statistic),
        sample_count: summary.map(|s| s.sample_count).unwrap_or(0),
        basis: ScoreBasis::Fallback,
        provenance: summary.map(|s| s.provenance.clone()),
    }
}

/// Score one zone on one dimension.
///
/// # Arguments
/// * `zone` - The zone being scored (population feeds per-capita transforms)
/// * `dimension` - The resilience dimension
/// * `spec` - Bucket table and fallback for the dimension
/// * `summary` - The zone's summary for the dimension's dataset, if that dataset ran
///
/// # Returns
/// * The bucketed score, or the neutral default when there is nothing to score
/// * `Err(PipelineError::InvariantViolation)` if the score leaves [0, 100]
pub fn score_zone(
    zone: &Zone,
    dimension: Dimension,
    spec: &DimensionSpec,
    summary: Option<&ZoneSummary>,
) -> PipelineResult<ZoneScore> {
    let Some(summary) = summary else {
        return Ok(fallback_score(zone, dimension, spec, None));
    };
    // Zero detections is an observation for count datasets; anything else needs samples.
    if summary.sample_count == 0 && summary.statistic_kind != Statistic::Count {
        return Ok(fallback_score(zone, dimension, spec, Some(summary)));
    }

    let value = match spec.transform {
        StatisticTransform::None => summary.statistic,
        StatisticTransform::PerThousandResidents => {
            if zone.population == 0 {
                return Ok(fallback_score(zone, dimension, spec, Some(summary)));
            }
            summary.statistic / zone.population as f64 * 1000.0
        }
    };

    let score = spec.buckets.score(value);
    if !(0.0..=100.0).contains(&score) {
        return Err(PipelineError::invariant_with_context(
            format!("score {} outside [0,100]", score),
            ErrorContext::new("score_zone")
                .with_entity(dimension.as_str())
                .with_entity_id(zone.id)
                .with_details(format!("statistic={}", value)),
        ));
    }

    Ok(ZoneScore {
        zone_id: zone.id,
        dimension,
        score,
        raw_statistic: Some(value),
        sample_count: summary.sample_count,
        basis: ScoreBasis::Observed,
        provenance: Some(summary.provenance.clone()),
    })
}

/// Score every zone on every dimension.
///
/// Output is grouped by zone (input order) and, within a zone, follows
/// [`Dimension::ALL`].
pub fn score_zones(
    zones: &[Zone],
    summaries: &[ZoneSummary],
    config: &AnalysisConfig,
) -> PipelineResult<Vec<ZoneScore>> {
    let specs: Vec<(Dimension, &DimensionSpec)> = Dimension::ALL
        .iter()
        .map(|&d| config.dimension(d).map(|spec| (d, spec)))
        .collect::<PipelineResult<_>>()?;

    let index: HashMap<(ZoneId, &str), &ZoneSummary> = summaries
        .iter()
        .map(|s| ((s.zone_id, s.dataset.as_str()), s))
        .collect();

    let per_zone: Vec<PipelineResult<Vec<ZoneScore>>> = zones
        .par_iter()
        .map(|zone| {
            specs
                .iter()
                .map(|(dimension, spec)| {
                    let summary = index.get(&(zone.id, spec.dataset.as_str())).copied();
                    score_zone(zone, *dimension, spec, summary)
                })
                .collect()
        })
        .collect();

    let mut scores = Vec::with_capacity(zones.len() * Dimension::ALL.len());
    for zone_scores in per_zone {
        scores.extend(zone_scores?);
    }
    let fallbacks = scores.iter().filter(|s| s.is_fallback()).count();
    debug!(
        "scored {} zones ({} of {} scores use the neutral fallback)",
        zones.len(),
        fallbacks,
        scores.len()
    );
    Ok(scores)
}

/// Arithmetic mean of each zone's dimension scores.
pub fn composite_scores(zones: &[Zone], scores: &[ZoneScore]) -> Vec<ZoneComposite> {
    zones
        .iter()
        .map(|zone| {
            let own: Vec<f64> = scores
                .iter()
                .filter(|s| s.zone_id == zone.id)
                .map(|s| s.score)
                .collect();
            let composite = if own.is_empty() {
                0.0
            } else {
                own.iter().sum::<f64>() / own.len() as f64
            };
            ZoneComposite {
                zone_id: zone.id,
                zone_name: zone.name.clone(),
                population: zone.population,
                composite,
            }
        })
        .collect()
}

/// Weighted mean of `(value, population)` pairs; unweighted when nobody lives there.
fn weighted_mean(values: impl Iterator<Item = (f64, u64)> + Clone) -> f64 {
    let total: u64 = values.clone().map(|(_, p)| p).sum();
    if total == 0 {
        let (sum, n) = values.fold((0.0, 0usize), |(s, n), (v, _)| (s + v, n + 1));
        return if n == 0 { 0.0 } else { sum / n as f64 };
    }
    values.map(|(v, p)| v * p as f64).sum::<f64>() / total as f64
}

/// Population-weighted city score over zone composites.
pub fn city_score(
    composites: &[ZoneComposite],
    scores: &[ZoneScore],
) -> PipelineResult<CityScore> {
    if composites.is_empty() {
        return Err(PipelineError::invariant("city score requires at least one zone"));
    }
    let score = weighted_mean(composites.iter().map(|c| (c.composite, c.population)));
    if !(0.0..=100.0).contains(&score) {
        return Err(PipelineError::invariant(format!(
            "city score {} outside [0,100]",
            score
        )));
    }

    let population: HashMap<_, _> = composites.iter().map(|c| (c.zone_id, c.population)).collect();
    let dimension_means: BTreeMap<Dimension, f64> = Dimension::ALL
        .iter()
        .map(|&d| {
            let pairs = scores
                .iter()
                .filter(move |s| s.dimension == d)
                .map(|s| (s.score, population.get(&s.zone_id).copied().unwrap_or(0)));
            (d, weighted_mean(pairs))
        })
        .collect();

    let status = CityStatus::from_score(score);
    info!("city resilience {:.1} ({})", score, status);

    Ok(CityScore {
        score,
        status,
        zones: composites.len(),
        total_population: composites.iter().map(|c| c.population).sum(),
        dimension_means,
    })
}
