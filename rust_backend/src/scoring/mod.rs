//! Resilience dimension scoring.
//!
//! Each zone receives one 0-100 score per [`Dimension`]. Zones are then combined into
//! a population-weighted city score with a status label.

pub mod buckets;
pub mod scorer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::{Provenance, ZoneId};

pub use scorer::{city_score, composite_scores, score_zone, score_zones};

/// A resilience dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    AirQuality,
    Heat,
    Flood,
    Healthcare,
    GreenSpace,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::AirQuality,
        Dimension::Heat,
        Dimension::Flood,
        Dimension::Healthcare,
        Dimension::GreenSpace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::AirQuality => "air_quality",
            Dimension::Heat => "heat",
            Dimension::Flood => "flood",
            Dimension::Healthcare => "healthcare",
            Dimension::GreenSpace => "green_space",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transformation applied to the zone statistic before bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticTransform {
    #[default]
    None,
    /// Count per 1000 residents (e.g. facilities per 1000 people).
    PerThousandResidents,
}

/// Whether a score was computed from data or is the configured neutral default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBasis {
    Observed,
    Fallback,
}

/// Score of one zone on one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneScore {
    pub zone_id: ZoneId,
    pub dimension: Dimension,
    /// Always within [0, 100].
    pub score: f64,
    /// Statistic the score was derived from, after any transform.
    pub raw_statistic: Option<f64>,
    pub sample_count: usize,
    pub basis: ScoreBasis,
    pub provenance: Option<Provenance>,
}

impl ZoneScore {
    pub fn is_fallback(&self) -> bool {
        self.basis == ScoreBasis::Fallback
    }
}

/// Mean of a zone's dimension scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneComposite {
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub population: u64,
    pub composite: f64,
}

/// City-wide resilience band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CityStatus {
    #[serde(rename = "Highly Resilient")]
    HighlyResilient,
    #[serde(rename = "Moderately Resilient")]
    ModeratelyResilient,
    #[serde(rename = "Developing Resilience")]
    DevelopingResilience,
    #[serde(rename = "Vulnerable")]
    Vulnerable,
    #[serde(rename = "Highly Vulnerable")]
    HighlyVulnerable,
}

impl CityStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            CityStatus::HighlyResilient
        } else if score >= 65.0 {
            CityStatus::ModeratelyResilient
        } else if score >= 50.0 {
            CityStatus::DevelopingResilience
        } else if score >= 35.0 {
            CityStatus::Vulnerable
        } else {
            CityStatus::HighlyVulnerable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CityStatus::HighlyResilient => "Highly Resilient",
            CityStatus::ModeratelyResilient => "Moderately Resilient",
            CityStatus::DevelopingResilience => "Developing Resilience",
            CityStatus::Vulnerable => "Vulnerable",
            CityStatus::HighlyVulnerable => "Highly Vulnerable",
        }
    }
}

impl fmt::Display for CityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Population-weighted city resilience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityScore {
    pub score: f64,
    pub status: CityStatus,
    pub zones: usize,
    pub total_population: u64,
    /// Population-weighted mean per dimension.
    pub dimension_means: BTreeMap<Dimension, f64>,
}
