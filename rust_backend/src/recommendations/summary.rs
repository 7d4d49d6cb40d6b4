//! Per-zone roll-up of ranked recommendations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{InterventionCategory, Priority, Recommendation};
use crate::core::{Zone, ZoneId};

/// Counts, cost and reach of the recommendations targeting one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecommendationSummary {
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total_cost_usd: f64,
    pub categories: Vec<InterventionCategory>,
    pub max_population_affected: u64,
}

impl ZoneRecommendationSummary {
    fn empty(zone: &Zone) -> Self {
        Self {
            zone_id: zone.id,
            zone_name: zone.name.clone(),
            total: 0,
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
            total_cost_usd: 0.0,
            categories: Vec::new(),
            max_population_affected: 0,
        }
    }
}

/// One summary per zone, in zone order. Zones without recommendations get zeros.
pub fn summarize_by_zone(
    zones: &[Zone],
    recommendations: &[Recommendation],
) -> Vec<ZoneRecommendationSummary> {
    zones
        .iter()
        .map(|zone| {
            let mut summary = ZoneRecommendationSummary::empty(zone);
            let mut categories = BTreeSet::new();
            for rec in recommendations.iter().filter(|r| r.zone_id == zone.id) {
                summary.total += 1;
                match rec.priority {
                    Priority::Critical => summary.critical += 1,
                    Priority::High => summary.high += 1,
                    Priority::Medium => summary.medium += 1,
                    Priority::Low => summary.low += 1,
                }
                summary.total_cost_usd += rec.estimated_cost_usd;
                summary.max_population_affected =
                    summary.max_population_affected.max(rec.population_affected);
                categories.insert(rec.category);
            }
            summary.categories = categories.into_iter().collect();
            summary
        })
        .collect()
}
