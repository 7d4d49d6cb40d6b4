//! Property tests for scoring bounds, recommendation ordering and quality relaxation.

use chrono::Utc;
use proptest::prelude::*;

use urban_resilience::aggregation::aggregate_field;
use urban_resilience::config::datasets;
use urban_resilience::core::{
    CalibratedField, Coverage, FieldCell, FieldGeometry, NativeLayout, PointSample, Provenance,
    RawObservationGrid, Zone, ZoneId,
};
use urban_resilience::georef::grid::TargetGrid;
use urban_resilience::quality::{FlagEncoding, QualityFilter};
use urban_resilience::recommendations::{
    rank, Impact, InterventionCategory, Priority, Recommendation, Timeline,
};
use urban_resilience::scoring::Dimension;
use urban_resilience::AnalysisConfig;

// ==================== Strategies ====================

fn priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
        Just(Priority::Critical),
    ]
}

fn impact() -> impl Strategy<Value = Impact> {
    prop_oneof![
        Just(Impact::Low),
        Just(Impact::Medium),
        Just(Impact::High),
        Just(Impact::Critical),
    ]
}

fn category() -> impl Strategy<Value = InterventionCategory> {
    prop_oneof![
        Just(InterventionCategory::AirQuality),
        Just(InterventionCategory::HeatMitigation),
        Just(InterventionCategory::FloodDefense),
        Just(InterventionCategory::Healthcare),
        Just(InterventionCategory::GreenSpace),
        Just(InterventionCategory::Infrastructure),
    ]
}

fn recommendation() -> impl Strategy<Value = Recommendation> {
    (priority(), impact(), 0u32..4, 0u64..5, 1u32..6, category()).prop_map(
        |(priority, impact, impact_bucket, population, zone, category)| Recommendation {
            zone_id: ZoneId(zone),
            zone_name: format!("Ward {}", zone),
            rule_id: "prop".to_string(),
            dimension: Dimension::Flood,
            category,
            priority,
            title: "Intervention".to_string(),
            description: String::new(),
            estimated_cost_usd: 1000.0,
            timeline: Timeline {
                min_months: 1,
                max_months: 2,
            },
            population_affected: population * 1000,
            impact,
            impact_score: impact_bucket as f64 * 250.0,
            severity: 0.5,
        },
    )
}

/// Key that must be non-increasing along a ranked list (first element most urgent).
fn rank_key(r: &Recommendation) -> (Priority, Impact, i64, u64, std::cmp::Reverse<ZoneId>, std::cmp::Reverse<InterventionCategory>) {
    (
        r.priority,
        r.impact,
        r.impact_score as i64,
        r.population_affected,
        std::cmp::Reverse(r.zone_id),
        std::cmp::Reverse(r.category),
    )
}

// ==================== Scoring ====================

proptest! {
    #[test]
    fn prop_default_scores_stay_in_range(statistic in -1.0e6f64..1.0e6) {
        let config = AnalysisConfig::default();
        for dimension in Dimension::ALL {
            let spec = config.dimension(dimension).unwrap();
            let score = spec.buckets.score(statistic);
            prop_assert!((0.0..=100.0).contains(&score), "{} scored {}", dimension, score);
        }
    }

    #[test]
    fn prop_boundaries_belong_to_lower_bucket(index in 0usize..4) {
        let config = AnalysisConfig::default();
        for dimension in Dimension::ALL {
            let table = &config.dimension(dimension).unwrap().buckets;
            if let Some(bucket) = table.buckets.get(index) {
                prop_assert_eq!(table.score(bucket.upper), bucket.score);
            }
        }
    }
}

// ==================== Ranking ====================

proptest! {
    #[test]
    fn prop_ranking_is_a_total_order(mut recs in prop::collection::vec(recommendation(), 0..40)) {
        rank(&mut recs);
        for pair in recs.windows(2) {
            prop_assert!(rank_key(&pair[0]) >= rank_key(&pair[1]));
        }
    }

    #[test]
    fn prop_ranking_ignores_input_order(recs in prop::collection::vec(recommendation(), 0..40)) {
        let mut forward = recs.clone();
        let mut backward: Vec<_> = recs.into_iter().rev().collect();
        rank(&mut forward);
        rank(&mut backward);
        let keys = |v: &[Recommendation]| v.iter().map(rank_key).collect::<Vec<_>>();
        prop_assert_eq!(keys(&forward), keys(&backward));
    }
}

// ==================== Quality Relaxation ====================

fn point_grid(flags: &[u8]) -> RawObservationGrid {
    let samples = flags
        .iter()
        .enumerate()
        .map(|(i, flag)| PointSample {
            lat: 19.0,
            lon: 72.8 + i as f64 * 1e-4,
            value: 1.0,
            flag: *flag,
        })
        .collect();
    RawObservationGrid::new(
        datasets::NDVI,
        NativeLayout::Points(samples),
        Utc::now(),
        Provenance::synthetic("prop"),
    )
}

proptest! {
    #[test]
    fn prop_qc_tolerance_is_strictest_sufficient(
        flags in prop::collection::vec(0u8..6, 0..60),
        min_valid in 0usize..60,
    ) {
        let grid = point_grid(&flags);
        let filter = QualityFilter::new(FlagEncoding::Ordinal, min_valid, 1, 3);
        let mask = filter.apply(&grid);

        if mask.insufficient_coverage {
            prop_assert_eq!(mask.tolerance, 3);
            prop_assert!(mask.accepted < min_valid);
        } else {
            prop_assert!(mask.accepted >= min_valid);
            if mask.tolerance > 1 {
                prop_assert!(filter.mask_at(&grid, mask.tolerance - 1).accepted < min_valid);
            }
        }
        // relaxing never loses pixels
        let counts: Vec<usize> = (1..=3).map(|t| filter.mask_at(&grid, t).accepted).collect();
        prop_assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    }
}

// ==================== Aggregation ====================

proptest! {
    #[test]
    fn prop_aggregation_is_idempotent(values in prop::collection::vec(prop::option::of(0.0f64..60.0), 100)) {
        let config = AnalysisConfig::default();
        let spec = config.dataset(datasets::LAND_SURFACE_TEMPERATURE).unwrap();
        let region = config.region.bounds;
        let grid = TargetGrid::new(region, 0.05).unwrap();
        let cells: Vec<FieldCell> = values
            .iter()
            .enumerate()
            .take(grid.len())
            .map(|(i, value)| {
                let (lat, lon) = grid.center(i);
                FieldCell { lat, lon, value: *value, sample_count: u32::from(value.is_some()), low_confidence: false }
            })
            .collect();
        let field = CalibratedField {
            dataset: datasets::LAND_SURFACE_TEMPERATURE.to_string(),
            unit: spec.unit.clone(),
            coverage: Coverage {
                covered_cells: cells.iter().filter(|c| c.value.is_some()).count(),
                total_cells: cells.len(),
                low_confidence_cells: 0,
            },
            geometry: FieldGeometry::Grid(grid),
            cells,
            provenance: Provenance::synthetic("prop"),
            captured_at: Utc::now(),
        };
        let zones = vec![
            Zone::rectangle(ZoneId(1), "South", 1000, 18.8, 72.7, 19.05, 72.9).unwrap(),
            Zone::rectangle(ZoneId(2), "North", 1000, 19.05, 72.7, 19.3, 72.9).unwrap(),
        ];
        let first = aggregate_field(&field, &zones, spec);
        let second = aggregate_field(&field, &zones, spec);
        prop_assert_eq!(first, second);
    }
}
