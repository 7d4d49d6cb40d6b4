//! Declarative recommendation rules and their estimators.

use serde::{Deserialize, Serialize};

use super::{Impact, InterventionCategory, Priority, Timeline};
use crate::scoring::{Dimension, ZoneScore};

/// Predicate over a zone's dimension score.
///
/// Statistic triggers compare the value the score was derived from (after any
/// per-capita transform) and never fire when that value is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", content = "value", rename_all = "snake_case")]
pub enum Trigger {
    ScoreAtMost(f64),
    ScoreBelow(f64),
    StatisticAbove(f64),
    StatisticAtLeast(f64),
    StatisticBelow(f64),
}

impl Trigger {
    pub fn fires(&self, score: &ZoneScore) -> bool {
        match *self {
            Trigger::ScoreAtMost(t) => score.score <= t,
            Trigger::ScoreBelow(t) => score.score < t,
            Trigger::StatisticAbove(t) => score.raw_statistic.is_some_and(|v| v > t),
            Trigger::StatisticAtLeast(t) => score.raw_statistic.is_some_and(|v| v >= t),
            Trigger::StatisticBelow(t) => score.raw_statistic.is_some_and(|v| v < t),
        }
    }

    fn threshold(&self) -> f64 {
        match *self {
            Trigger::ScoreAtMost(t)
            | Trigger::ScoreBelow(t)
            | Trigger::StatisticAbove(t)
            | Trigger::StatisticAtLeast(t)
            | Trigger::StatisticBelow(t) => t,
        }
    }
}

/// `(base + per_capita * affected) * (1 + severity_multiplier * severity)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub base_usd: f64,
    #[serde(default)]
    pub per_capita_usd: f64,
    #[serde(default = "default_severity_multiplier")]
    pub severity_multiplier: f64,
}

fn default_severity_multiplier() -> f64 {
    0.5
}

impl CostModel {
    pub fn estimate(&self, affected: u64, severity: f64) -> f64 {
        let raw = (self.base_usd + self.per_capita_usd * affected as f64)
            * (1.0 + self.severity_multiplier * severity);
        raw.round()
    }
}

/// `[min, max + round(extension * severity)]` months.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineModel {
    pub min_months: u32,
    pub max_months: u32,
    #[serde(default)]
    pub severity_extension_months: u32,
}

impl TimelineModel {
    pub fn estimate(&self, severity: f64) -> Timeline {
        let extension = (self.severity_extension_months as f64 * severity).round() as u32;
        Timeline {
            min_months: self.min_months,
            max_months: self.max_months + extension,
        }
    }
}

/// Share of the zone population reached, interpolated by severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReachModel {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for ReachModel {
    fn default() -> Self {
        Self {
            floor: 0.5,
            ceiling: 1.0,
        }
    }
}

impl ReachModel {
    pub fn estimate(&self, population: u64, severity: f64) -> u64 {
        let share = self.floor + (self.ceiling - self.floor) * severity;
        (population as f64 * share).round() as u64
    }
}

/// One declarative recommendation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRule {
    pub id: String,
    pub dimension: Dimension,
    pub trigger: Trigger,
    pub category: InterventionCategory,
    pub priority: Priority,
    pub impact: Impact,
    pub title: String,
    /// May reference `{zone}` and `{value}`.
    pub description: String,
    pub cost: CostModel,
    pub timeline: TimelineModel,
    #[serde(default)]
    pub reach: ReachModel,
    /// Fire even when the score is the neutral fallback.
    #[serde(default)]
    pub fire_on_fallback: bool,
}

impl RecommendationRule {
    pub fn applies_to(&self, score: &ZoneScore) -> bool {
        self.dimension == score.dimension
            && (self.fire_on_fallback || !score.is_fallback())
            && self.trigger.fires(score)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("rule id must not be empty".to_string());
        }
        if !self.trigger.threshold().is_finite() {
            return Err("trigger threshold must be finite".to_string());
        }
        if !(self.cost.base_usd >= 0.0)
            || !(self.cost.per_capita_usd >= 0.0)
            || !(self.cost.severity_multiplier >= 0.0)
        {
            return Err("cost parameters must be non-negative".to_string());
        }
        if self.timeline.min_months > self.timeline.max_months {
            return Err("timeline min_months exceeds max_months".to_string());
        }
        let reach = self.reach;
        if !(0.0..=1.0).contains(&reach.floor)
            || !(0.0..=1.0).contains(&reach.ceiling)
            || reach.floor > reach.ceiling
        {
            return Err("reach must satisfy 0 <= floor <= ceiling <= 1".to_string());
        }
        Ok(())
    }
}

struct RuleDef {
    id: &'static str,
    dimension: Dimension,
    trigger: Trigger,
    category: InterventionCategory,
    priority: Priority,
    impact: Impact,
    title: &'static str,
    description: &'static str,
    base_usd: f64,
    per_capita_usd: f64,
    months: (u32, u32, u32),
}

impl From<RuleDef> for RecommendationRule {
    fn from(d: RuleDef) -> Self {
        RecommendationRule {
            id: d.id.to_string(),
            dimension: d.dimension,
            trigger: d.trigger,
            category: d.category,
            priority: d.priority,
            impact: d.impact,
            title: d.title.to_string(),
            description: d.description.to_string(),
            cost: CostModel {
                base_usd: d.base_usd,
                per_capita_usd: d.per_capita_usd,
                severity_multiplier: default_severity_multiplier(),
            },
            timeline: TimelineModel {
                min_months: d.months.0,
                max_months: d.months.1,
                severity_extension_months: d.months.2,
            },
            reach: ReachModel::default(),
            fire_on_fallback: false,
        }
    }
}

/// Built-in rule set.
pub fn default_rules() -> Vec<RecommendationRule> {
    use Dimension::*;
    use InterventionCategory as C;

    let defs = vec![
        RuleDef {
            id: "aq-emergency-control",
            dimension: AirQuality,
            trigger: Trigger::StatisticAbove(200.0),
            category: C::AirQuality,
            priority: Priority::Critical,
            impact: Impact::High,
            title: "Emergency pollution control",
            description: "AQI of {value} in {zone}: restrict heavy vehicles, halt open burning and enforce construction dust controls.",
            base_usd: 500_000.0,
            per_capita_usd: 0.5,
            months: (3, 6, 0),
        },
        RuleDef {
            id: "aq-monitoring-network",
            dimension: AirQuality,
            trigger: Trigger::StatisticAbove(150.0),
            category: C::AirQuality,
            priority: Priority::High,
            impact: Impact::Medium,
            title: "Air quality monitoring network",
            description: "Deploy low-cost sensors across {zone} (AQI {value}) and publish real-time alerts.",
            base_usd: 300_000.0,
            per_capita_usd: 0.2,
            months: (6, 12, 0),
        },
        RuleDef {
            id: "aq-tree-buffer",
            dimension: AirQuality,
            trigger: Trigger::StatisticAbove(100.0),
            category: C::GreenSpace,
            priority: Priority::Medium,
            impact: Impact::Medium,
            title: "Roadside tree buffers",
            description: "Plant pollution-tolerant species along arterial roads in {zone} (AQI {value}).",
            base_usd: 150_000.0,
            per_capita_usd: 0.1,
            months: (12, 18, 0),
        },
        RuleDef {
            id: "heat-action-plan",
            dimension: Heat,
            trigger: Trigger::ScoreAtMost(10.0),
            category: C::HeatMitigation,
            priority: Priority::Critical,
            impact: Impact::High,
            title: "Heat action plan and cooling centres",
            description: "Surface temperatures average {value} °C in {zone}: open cooling centres and issue heat alerts.",
            base_usd: 400_000.0,
            per_capita_usd: 0.3,
            months: (3, 6, 3),
        },
        RuleDef {
            id: "heat-cool-roofs",
            dimension: Heat,
            trigger: Trigger::ScoreAtMost(35.0),
            category: C::HeatMitigation,
            priority: Priority::High,
            impact: Impact::Medium,
            title: "Cool roof programme",
            description: "Subsidise reflective roofing in {zone} ({value} °C average surface temperature).",
            base_usd: 250_000.0,
            per_capita_usd: 0.4,
            months: (6, 12, 6),
        },
        RuleDef {
            id: "heat-urban-forest",
            dimension: Heat,
            trigger: Trigger::ScoreAtMost(65.0),
            category: C::GreenSpace,
            priority: Priority::Medium,
            impact: Impact::Medium,
            title: "Urban forest corridors",
            description: "Create shaded green corridors to reduce the urban heat island in {zone}.",
            base_usd: 200_000.0,
            per_capita_usd: 0.2,
            months: (12, 24, 6),
        },
        RuleDef {
            id: "flood-drainage-upgrade",
            dimension: Flood,
            trigger: Trigger::ScoreAtMost(15.0),
            category: C::FloodDefense,
            priority: Priority::Critical,
            impact: Impact::High,
            title: "Storm drain capacity upgrade",
            description: "Flood risk index {value} in {zone}: desilt and widen storm drains before the monsoon.",
            base_usd: 800_000.0,
            per_capita_usd: 1.0,
            months: (6, 12, 6),
        },
        RuleDef {
            id: "flood-critical-infrastructure",
            dimension: Flood,
            trigger: Trigger::ScoreAtMost(15.0),
            category: C::Infrastructure,
            priority: Priority::High,
            impact: Impact::High,
            title: "Flood-proof critical infrastructure",
            description: "Elevate substations, pumps and hospital generators in {zone}.",
            base_usd: 600_000.0,
            per_capita_usd: 0.5,
            months: (12, 24, 6),
        },
        RuleDef {
            id: "flood-retention",
            dimension: Flood,
            trigger: Trigger::ScoreAtMost(40.0),
            category: C::FloodDefense,
            priority: Priority::High,
            impact: Impact::Medium,
            title: "Retention basins and flood barriers",
            description: "Build retention capacity for {zone} (flood risk index {value}).",
            base_usd: 400_000.0,
            per_capita_usd: 0.5,
            months: (6, 18, 6),
        },
        RuleDef {
            id: "flood-early-warning",
            dimension: Flood,
            trigger: Trigger::ScoreAtMost(70.0),
            category: C::FloodDefense,
            priority: Priority::Medium,
            impact: Impact::Low,
            title: "Community flood early warning",
            description: "Set up SMS and siren flood alerts for {zone}.",
            base_usd: 150_000.0,
            per_capita_usd: 0.1,
            months: (3, 6, 0),
        },
        RuleDef {
            id: "health-primary-centres",
            dimension: Healthcare,
            trigger: Trigger::StatisticBelow(0.2),
            category: C::Healthcare,
            priority: Priority::Critical,
            impact: Impact::High,
            title: "New primary health centres",
            description: "Only {value} facilities per 1000 residents in {zone}: build primary health centres.",
            base_usd: 1_000_000.0,
            per_capita_usd: 1.0,
            months: (12, 24, 12),
        },
        RuleDef {
            id: "health-mobile-units",
            dimension: Healthcare,
            trigger: Trigger::StatisticBelow(0.5),
            category: C::Healthcare,
            priority: Priority::High,
            impact: Impact::Medium,
            title: "Mobile health units",
            description: "Deploy mobile clinics to {zone} ({value} facilities per 1000 residents).",
            base_usd: 500_000.0,
            per_capita_usd: 0.3,
            months: (3, 6, 3),
        },
        RuleDef {
            id: "green-pocket-parks",
            dimension: GreenSpace,
            trigger: Trigger::ScoreBelow(30.0),
            category: C::GreenSpace,
            priority: Priority::Critical,
            impact: Impact::High,
            title: "Pocket parks on vacant land",
            description: "Vegetation index {value} in {zone}: convert vacant plots into public pocket parks.",
            base_usd: 300_000.0,
            per_capita_usd: 0.3,
            months: (6, 12, 6),
        },
        RuleDef {
            id: "green-street-trees",
            dimension: GreenSpace,
            trigger: Trigger::ScoreBelow(50.0),
            category: C::GreenSpace,
            priority: Priority::High,
            impact: Impact::Medium,
            title: "Street tree programme",
            description: "Plant and maintain street trees across {zone}.",
            base_usd: 150_000.0,
            per_capita_usd: 0.1,
            months: (6, 12, 0),
        },
    ];
    defs.into_iter().map(RecommendationRule::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ZoneId;
    use crate::scoring::ScoreBasis;

    fn score(dimension: Dimension, score: f64, raw: Option<f64>, basis: ScoreBasis) -> ZoneScore {
        ZoneScore {
            zone_id: ZoneId(1),
            dimension,
            score,
            raw_statistic: raw,
            sample_count: 1,
            basis,
            provenance: None,
        }
    }

    #[test]
    fn test_default_rules_validate() {
        let rules = default_rules();
        assert!(rules.len() >= 12);
        for rule in &rules {
            rule.validate().unwrap();
        }
    }

    #[test]
    fn test_triggers() {
        let s = score(Dimension::AirQuality, 20.0, Some(230.9), ScoreBasis::Observed);
        assert!(Trigger::StatisticAbove(200.0).fires(&s));
        assert!(!Trigger::StatisticAbove(230.9).fires(&s));
        assert!(Trigger::StatisticAtLeast(230.9).fires(&s));
        assert!(Trigger::ScoreAtMost(20.0).fires(&s));
        assert!(!Trigger::ScoreBelow(20.0).fires(&s));

        let unknown = score(Dimension::AirQuality, 50.0, None, ScoreBasis::Fallback);
        assert!(!Trigger::StatisticBelow(1000.0).fires(&unknown));
    }

    #[test]
    fn test_fallback_scores_are_skipped_by_default() {
        let mut rule = default_rules()
            .into_iter()
            .find(|r| r.id == "heat-urban-forest")
            .unwrap();
        let neutral = score(Dimension::Heat, 50.0, Some(32.0), ScoreBasis::Fallback);
        assert!(!rule.applies_to(&neutral));
        rule.fire_on_fallback = true;
        assert!(rule.applies_to(&neutral));
        let other = score(Dimension::Flood, 10.0, Some(0.9), ScoreBasis::Observed);
        assert!(!rule.applies_to(&other));
    }

    #[test]
    fn test_estimators_scale_with_severity() {
        let cost = CostModel {
            base_usd: 100_000.0,
            per_capita_usd: 1.0,
            severity_multiplier: 0.5,
        };
        assert_eq!(cost.estimate(10_000, 0.0), 110_000.0);
        assert_eq!(cost.estimate(10_000, 1.0), 165_000.0);

        let timeline = TimelineModel {
            min_months: 6,
            max_months: 12,
            severity_extension_months: 6,
        };
        assert_eq!(timeline.estimate(0.5).max_months, 15);
        assert_eq!(timeline.estimate(0.0).to_string(), "6-12 months");

        assert_eq!(ReachModel::default().estimate(1000, 0.0), 500);
        assert_eq!(ReachModel::default().estimate(1000, 1.0), 1000);
    }

    #[test]
    fn test_rule_toml_form() {
        let toml = r#"
id = "custom"
dimension = "heat"
trigger = { when = "statistic_above", value = 38.0 }
category = "heat_mitigation"
priority = "high"
impact = "medium"
title = "Shade structures"
description = "Install shade in {zone}"
cost = { base_usd = 50000.0 }
timeline = { min_months = 1, max_months = 3 }
"#;
        let rule: RecommendationRule = toml::from_str(toml).unwrap();
        assert_eq!(rule.trigger, Trigger::StatisticAbove(38.0));
        assert_eq!(rule.cost.severity_multiplier, 0.5);
        assert_eq!(rule.reach, ReachModel::default());
        rule.validate().unwrap();
    }
}
