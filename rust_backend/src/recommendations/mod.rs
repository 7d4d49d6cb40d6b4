//! Rule-based intervention recommendations.
//!
//! Rules are declarative records (see [`rules`]); the synthesizer evaluates them
//! uniformly against zone scores, deduplicates per (zone, category) and ranks the
//! result in a total order.

pub mod rules;
pub mod summary;
pub mod synthesizer;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::ZoneId;
use crate::scoring::Dimension;

pub use summary::{summarize_by_zone, ZoneRecommendationSummary};
pub use synthesizer::{rank, synthesize};

/// Urgency of an intervention. Ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// Qualitative impact estimate. Ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
    Critical,
}

impl Impact {
    /// One level up, saturating at `Critical`.
    pub fn promoted(self) -> Self {
        match self {
            Impact::Low => Impact::Medium,
            Impact::Medium => Impact::High,
            Impact::High | Impact::Critical => Impact::Critical,
        }
    }
}

/// Intervention family; at most one recommendation per zone and category survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionCategory {
    AirQuality,
    HeatMitigation,
    FloodDefense,
    Healthcare,
    GreenSpace,
    Infrastructure,
}

impl fmt::Display for InterventionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterventionCategory::AirQuality => "air_quality",
            InterventionCategory::HeatMitigation => "heat_mitigation",
            InterventionCategory::FloodDefense => "flood_defense",
            InterventionCategory::Healthcare => "healthcare",
            InterventionCategory::GreenSpace => "green_space",
            InterventionCategory::Infrastructure => "infrastructure",
        };
        f.write_str(s)
    }
}

/// Implementation window in months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub min_months: u32,
    pub max_months: u32,
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} months", self.min_months, self.max_months)
    }
}

/// A costed intervention for one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub rule_id: String,
    pub dimension: Dimension,
    pub category: InterventionCategory,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub estimated_cost_usd: f64,
    pub timeline: Timeline,
    pub population_affected: u64,
    pub impact: Impact,
    /// Severity-weighted affected population, used for ranking.
    pub impact_score: f64,
    /// `(100 - score) / 100` of the triggering dimension score.
    pub severity: f64,
}
