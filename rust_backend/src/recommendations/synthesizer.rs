//! Rule evaluation, deduplication and ranking.

use log::debug;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::rules::RecommendationRule;
use super::{InterventionCategory, Recommendation};
use crate::core::{Zone, ZoneId};
use crate::scoring::ZoneScore;

fn severity(score: f64) -> f64 {
    ((100.0 - score) / 100.0).clamp(0.0, 1.0)
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.abs() >= 10.0 => format!("{:.1}", v),
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

/// Build the candidate produced by `rule` firing on `score`.
fn candidate(zone: &Zone, score: &ZoneScore, rule: &RecommendationRule) -> Recommendation {
    let severity = severity(score.score);
    let affected = rule.reach.estimate(zone.population, severity);
    let impact = if severity >= 0.75 {
        rule.impact.promoted()
    } else {
        rule.impact
    };
    let description = rule
        .description
        .replace("{zone}", &zone.name)
        .replace("{value}", &format_value(score.raw_statistic));

    Recommendation {
        zone_id: zone.id,
        zone_name: zone.name.clone(),
        rule_id: rule.id.clone(),
        dimension: score.dimension,
        category: rule.category,
        priority: rule.priority,
        title: rule.title.clone(),
        description,
        estimated_cost_usd: rule.cost.estimate(affected, severity),
        timeline: rule.timeline.estimate(severity),
        population_affected: affected,
        impact,
        impact_score: severity * affected as f64,
        severity,
    }
}

/// Merge two candidates for the same (zone, category).
///
/// The higher priority wins (ties go to the higher impact, then the earlier rule);
/// the affected population is the larger of the two, capped at the zone population.
/// Cost and impact score are re-estimated for that population with the winning rule.
fn merge(
    existing: Recommendation,
    incoming: Recommendation,
    population: u64,
    rules: &HashMap<&str, &RecommendationRule>,
) -> Recommendation {
    let incoming_wins = match incoming.priority.cmp(&existing.priority) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => incoming.impact_score > existing.impact_score,
    };
    let affected = existing
        .population_affected
        .max(incoming.population_affected)
        .min(population);
    let mut winner = if incoming_wins { incoming } else { existing };
    winner.population_affected = affected;
    winner.impact_score = winner.severity * affected as f64;
    if let Some(rule) = rules.get(winner.rule_id.as_str()) {
        winner.estimated_cost_usd = rule.cost.estimate(affected, winner.severity);
    }
    winner
}

/// Total order: priority desc, impact desc, impact score desc, population desc,
/// zone id asc, category asc.
fn compare(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.impact.cmp(&a.impact))
        .then_with(|| b.impact_score.total_cmp(&a.impact_score))
        .then_with(|| b.population_affected.cmp(&a.population_affected))
        .then_with(|| a.zone_id.cmp(&b.zone_id))
        .then_with(|| a.category.cmp(&b.category))
}

/// Sort recommendations into their final ranking.
pub fn rank(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(compare);
}

/// Evaluate every rule against every zone score, deduplicate and rank.
///
/// # Arguments
/// * `zones` - Zones referenced by the scores
/// * `scores` - All zone scores of the run (must be complete: this is the barrier
///   after scoring)
/// * `rules` - Rules in evaluation order
pub fn synthesize(
    zones: &[Zone],
    scores: &[ZoneScore],
    rules: &[RecommendationRule],
) -> Vec<Recommendation> {
    let by_id: HashMap<ZoneId, &Zone> = zones.iter().map(|z| (z.id, z)).collect();
    let rules_by_id: HashMap<&str, &RecommendationRule> =
        rules.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut merged: BTreeMap<(ZoneId, InterventionCategory), Recommendation> = BTreeMap::new();
    let mut fired = 0usize;

    for score in scores {
        let Some(zone) = by_id.get(&score.zone_id) else {
            continue;
        };
        for rule in rules.iter().filter(|r| r.applies_to(score)) {
            fired += 1;
            let rec = candidate(zone, score, rule);
            let key = (zone.id, rule.category);
            let next = match merged.remove(&key) {
                Some(existing) => merge(existing, rec, zone.population, &rules_by_id),
                None => rec,
            };
            merged.insert(key, next);
        }
    }

    let mut recommendations: Vec<Recommendation> = merged.into_values().collect();
    rank(&mut recommendations);
    debug!(
        "{} rule firings merged into {} recommendations",
        fired,
        recommendations.len()
    );
    recommendations
}
