//! Monotonic step functions from a zone statistic to a bounded score.

use serde::{Deserialize, Serialize};

/// Statistics up to and including `upper` score `score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub upper: f64,
    pub score: f64,
}

/// Ordered buckets plus the score for anything above the last bound.
///
/// A value exactly on a boundary belongs to the lower bucket, so with the default
/// air-quality table an AQI of exactly 100 scores 80, not 50.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketTable {
    pub buckets: Vec<Bucket>,
    pub above: f64,
}

impl BucketTable {
    /// Score of the first bucket whose upper bound is >= `statistic`.
    pub fn score(&self, statistic: f64) -> f64 {
        self.buckets
            .iter()
            .find(|b| statistic <= b.upper)
            .map(|b| b.score)
            .unwrap_or(self.above)
    }

    /// Bounds strictly ascending, scores within [0,100] and monotonic in one direction.
    pub fn validate(&self) -> Result<(), String> {
        if self.buckets.is_empty() {
            return Err("bucket table has no buckets".to_string());
        }
        let scores: Vec<f64> = self
            .buckets
            .iter()
            .map(|b| b.score)
            .chain(std::iter::once(self.above))
            .collect();
        if let Some(bad) = scores.iter().find(|s| !(0.0..=100.0).contains(*s)) {
            return Err(format!("bucket score {} outside [0,100]", bad));
        }
        if self.buckets.iter().any(|b| !b.upper.is_finite()) {
            return Err("bucket upper bounds must be finite".to_string());
        }
        if self.buckets.windows(2).any(|w| w[1].upper <= w[0].upper) {
            return Err("bucket upper bounds must be strictly ascending".to_string());
        }
        let non_increasing = scores.windows(2).all(|w| w[1] <= w[0]);
        let non_decreasing = scores.windows(2).all(|w| w[1] >= w[0]);
        if !non_increasing && !non_decreasing {
            return Err("bucket scores must be monotonic".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn air_quality() -> BucketTable {
        BucketTable {
            buckets: vec![
                Bucket { upper: 50.0, score: 100.0 },
                Bucket { upper: 100.0, score: 80.0 },
                Bucket { upper: 200.0, score: 50.0 },
                Bucket { upper: 300.0, score: 20.0 },
            ],
            above: 0.0,
        }
    }

    #[test]
    fn test_boundaries_belong_to_lower_bucket() {
        let table = air_quality();
        assert_eq!(table.score(50.0), 100.0);
        assert_eq!(table.score(50.000001), 80.0);
        assert_eq!(table.score(100.0), 80.0);
        assert_eq!(table.score(200.0), 50.0);
        assert_eq!(table.score(300.0), 20.0);
        assert_eq!(table.score(300.1), 0.0);
    }

    #[test]
    fn test_aqi_230_9_scores_20() {
        assert_eq!(air_quality().score(230.9), 20.0);
    }

    #[test]
    fn test_validation_rejects_bad_tables() {
        let mut table = air_quality();
        table.buckets[1].score = 120.0;
        assert!(table.validate().is_err());

        let mut table = air_quality();
        table.buckets[2].upper = 90.0;
        assert!(table.validate().is_err());

        let mut table = air_quality();
        table.buckets[2].score = 90.0;
        assert!(table.validate().unwrap_err().contains("monotonic"));

        let empty = BucketTable { buckets: vec![], above: 0.0 };
        assert!(empty.validate().is_err());

        air_quality().validate().unwrap();
    }
}
