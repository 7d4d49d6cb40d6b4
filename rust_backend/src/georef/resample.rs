//! Resampling of located, calibrated samples onto the target grid.
//!
//! Three strategies cover every native layout:
//! - nearest-cell rasterization for projected and regular grids,
//! - inverse-distance weighting for swaths,
//! - pass-through binning for discrete point sets.

use serde::{Deserialize, Serialize};

use crate::core::{BoundingBox, Coverage, FieldCell};
use crate::georef::grid::TargetGrid;

/// Exact-hit distance for IDW, in degrees.
const IDW_EPSILON: f64 = 1e-10;

/// Run-wide statistic used for swath cells with no sample in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStatistic {
    #[default]
    Mean,
    Median,
}

impl FallbackStatistic {
    pub fn compute(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            FallbackStatistic::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            FallbackStatistic::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }
}

/// A calibrated value at a geographic location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatedValue {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

fn empty_cells(grid: &TargetGrid) -> Vec<FieldCell> {
    (0..grid.len())
        .map(|i| {
            let (lat, lon) = grid.center(i);
            FieldCell {
                lat,
                lon,
                value: None,
                sample_count: 0,
                low_confidence: false,
            }
        })
        .collect()
}

fn coverage_of(cells: &[FieldCell]) -> Coverage {
    Coverage {
        covered_cells: cells.iter().filter(|c| c.sample_count > 0).count(),
        total_cells: cells.len(),
        low_confidence_cells: cells.iter().filter(|c| c.low_confidence).count(),
    }
}

/// Nearest-cell assignment. Samples farther than `snap_tolerance` degrees from
/// their nearest cell centre, or outside `padded`, are dropped; cells that receive
/// several samples hold their mean.
pub fn rasterize(
    grid: &TargetGrid,
    samples: &[LocatedValue],
    padded: &BoundingBox,
    snap_tolerance: f64,
) -> (Vec<FieldCell>, Coverage) {
    let mut sums = vec![0.0_f64; grid.len()];
    let mut counts = vec![0_u32; grid.len()];

    for s in samples {
        if !padded.contains(s.lat, s.lon) {
            continue;
        }
        let (index, distance) = grid.nearest(s.lat, s.lon);
        if distance > snap_tolerance {
            continue;
        }
        sums[index] += s.value;
        counts[index] += 1;
    }

    let mut cells = empty_cells(grid);
    for (i, cell) in cells.iter_mut().enumerate() {
        if counts[i] > 0 {
            cell.value = Some(sums[i] / counts[i] as f64);
            cell.sample_count = counts[i];
        }
    }
    let coverage = coverage_of(&cells);
    (cells, coverage)
}

/// Parameters for [`interpolate_idw`].
#[derive(Debug, Clone, Copy)]
pub struct IdwParams {
    pub search_radius: f64,
    pub power: f64,
    pub fallback: FallbackStatistic,
}

/// Inverse-distance weighting of swath samples onto the grid.
///
/// Only samples inside `padded` contribute locally. Cells with no contributing sample
/// within the search radius take the fallback statistic of *all* samples passed in
/// and are flagged low-confidence.
pub fn interpolate_idw(
    grid: &TargetGrid,
    samples: &[LocatedValue],
    padded: &BoundingBox,
    params: IdwParams,
) -> (Vec<FieldCell>, Coverage) {
    let all_values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let fallback = params.fallback.compute(&all_values);
    let local: Vec<&LocatedValue> = samples
        .iter()
        .filter(|s| padded.contains(s.lat, s.lon))
        .collect();

    let mut cells = empty_cells(grid);
    for cell in cells.iter_mut() {
        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        let mut contributing = 0_u32;
        let mut exact = None;

        for s in &local {
            let distance = ((s.lat - cell.lat).powi(2) + (s.lon - cell.lon).powi(2)).sqrt();
            if distance > params.search_radius {
                continue;
            }
            contributing += 1;
            if distance < IDW_EPSILON {
                exact = Some(s.value);
                continue;
            }
            let weight = 1.0 / distance.powf(params.power);
            weight_sum += weight;
            value_sum += weight * s.value;
        }

        if contributing > 0 {
            cell.sample_count = contributing;
            cell.value = exact.or(Some(value_sum / weight_sum));
        } else if let Some(value) = fallback {
            cell.value = Some(value);
            cell.low_confidence = true;
        }
    }
    let coverage = coverage_of(&cells);
    (cells, coverage)
}

/// Keeps points inside the exact region; coverage is measured by binning them onto
/// the grid.
pub fn bin_points(grid: &TargetGrid, samples: &[LocatedValue]) -> (Vec<FieldCell>, Coverage) {
    let mut occupied = vec![false; grid.len()];
    let points: Vec<FieldCell> = samples
        .iter()
        .filter_map(|s| {
            let index = grid.index_of(s.lat, s.lon)?;
            occupied[index] = true;
            Some(FieldCell {
                lat: s.lat,
                lon: s.lon,
                value: Some(s.value),
                sample_count: 1,
                low_confidence: false,
            })
        })
        .collect();
    let coverage = Coverage {
        covered_cells: occupied.iter().filter(|o| **o).count(),
        total_cells: grid.len(),
        low_confidence_cells: 0,
    };
    (points, coverage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TargetGrid {
        let region = BoundingBox::new(19.0, 18.9, 72.9, 72.8).unwrap();
        TargetGrid::new(region, 0.05).unwrap()
    }

    fn at(lat: f64, lon: f64, value: f64) -> LocatedValue {
        LocatedValue { lat, lon, value }
    }

    #[test]
    fn test_rasterize_averages_and_drops_far_samples() {
        let g = grid();
        let padded = g.region().expanded(0.1);
        let samples = vec![
            at(18.98, 72.82, 30.0),
            at(18.97, 72.83, 34.0),
            at(18.91, 72.88, 40.0),
            // inside the padded box but far beyond the snap tolerance
            at(19.08, 72.85, 99.0),
        ];
        let (cells, coverage) = rasterize(&g, &samples, &padded, 0.05);
        assert_eq!(coverage.total_cells, 4);
        assert_eq!(coverage.covered_cells, 2);
        let nw = cells[0];
        assert_eq!(nw.sample_count, 2);
        assert_eq!(nw.value, Some(32.0));
        assert!(cells.iter().all(|c| c.value != Some(99.0)));
    }

    #[test]
    fn test_idw_exact_hit_and_fallback() {
        let g = grid();
        let padded = g.region().expanded(0.1);
        let (nw_lat, nw_lon) = g.center(0);
        let samples = vec![at(nw_lat, nw_lon, 10.0), at(nw_lat - 0.01, nw_lon, 20.0)];
        let params = IdwParams {
            search_radius: 0.02,
            power: 2.0,
            fallback: FallbackStatistic::Mean,
        };
        let (cells, coverage) = interpolate_idw(&g, &samples, &padded, params);
        assert_eq!(cells[0].value, Some(10.0));
        assert_eq!(cells[0].sample_count, 2);
        assert!(!cells[0].low_confidence);

        // the south-east cell is well beyond the search radius of both samples
        let se = cells[3];
        assert_eq!(se.value, Some(15.0));
        assert!(se.low_confidence);
        assert_eq!(se.sample_count, 0);
        assert_eq!(coverage.covered_cells, 1);
        assert_eq!(coverage.low_confidence_cells, 3);
    }

    #[test]
    fn test_idw_weights_by_inverse_square_distance() {
        let g = grid();
        let padded = g.region().expanded(0.1);
        let (lat, lon) = g.center(0);
        let samples = vec![at(lat + 0.01, lon, 10.0), at(lat - 0.02, lon, 40.0)];
        let params = IdwParams {
            search_radius: 0.03,
            power: 2.0,
            fallback: FallbackStatistic::Median,
        };
        let (cells, _) = interpolate_idw(&g, &samples, &padded, params);
        // weights 1/0.0001 and 1/0.0004 -> (10*4 + 40*1) / 5
        let value = cells[0].value.unwrap();
        assert!((value - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_uses_samples_outside_padding() {
        let g = grid();
        let padded = g.region().expanded(0.1);
        let samples = vec![at(25.0, 80.0, 7.0)];
        let params = IdwParams {
            search_radius: 0.02,
            power: 2.0,
            fallback: FallbackStatistic::Mean,
        };
        let (cells, coverage) = interpolate_idw(&g, &samples, &padded, params);
        assert!(cells.iter().all(|c| c.value == Some(7.0) && c.low_confidence));
        assert_eq!(coverage.fraction(), 0.0);
    }

    #[test]
    fn test_bin_points_clips_to_region() {
        let g = grid();
        let samples = vec![at(18.93, 72.83, 1.0), at(18.94, 72.84, 1.0), at(19.5, 72.85, 1.0)];
        let (points, coverage) = bin_points(&g, &samples);
        assert_eq!(points.len(), 2);
        assert_eq!(coverage.covered_cells, 1);
    }

    #[test]
    fn test_median_fallback() {
        assert_eq!(FallbackStatistic::Median.compute(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(FallbackStatistic::Median.compute(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(FallbackStatistic::Mean.compute(&[]), None);
    }
}
