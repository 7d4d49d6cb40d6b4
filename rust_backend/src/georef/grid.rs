//! Regular output grid covering the region of interest.

use crate::core::{BoundingBox, ErrorContext, PipelineError, PipelineResult};

/// Upper bound on output cells, far above any city-scale configuration.
const MAX_CELLS: usize = 16_000_000;
/// Cell counts this close to an integer are taken as exact.
const COUNT_EPSILON: f64 = 1e-6;

/// Cells needed to span `span` at `resolution`, rounding up.
fn cell_count(span: f64, resolution: f64) -> usize {
    let exact = span / resolution;
    let nearest = exact.round();
    let count = if (exact - nearest).abs() < COUNT_EPSILON {
        nearest
    } else {
        exact.ceil()
    };
    (count as usize).max(1)
}

/// North-up regular lat/lon grid that exactly tiles a bounding box.
///
/// Row 0 is the northernmost row, column 0 the westernmost column.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGrid {
    region: BoundingBox,
    rows: usize,
    cols: usize,
    lat_step: f64,
    lon_step: f64,
}

impl TargetGrid {
    /// Builds the grid for `region` at roughly `resolution_deg` per cell.
    ///
    /// The cell count is rounded up so the grid never undersamples; the actual step
    /// is then shrunk so the cells tile the box exactly.
    pub fn new(region: BoundingBox, resolution_deg: f64) -> PipelineResult<Self> {
        region.validate()?;
        if !resolution_deg.is_finite() || resolution_deg <= 0.0 {
            return Err(PipelineError::configuration_with_context(
                format!("grid resolution must be positive, got {}", resolution_deg),
                ErrorContext::new("build_target_grid"),
            ));
        }
        let rows = cell_count(region.lat_span(), resolution_deg);
        let cols = cell_count(region.lon_span(), resolution_deg);
        if rows.saturating_mul(cols) > MAX_CELLS {
            return Err(PipelineError::configuration(format!(
                "target grid of {}x{} cells is too large",
                rows, cols
            )));
        }
        Ok(Self {
            region,
            rows,
            cols,
            lat_step: region.lat_span() / rows as f64,
            lon_step: region.lon_span() / cols as f64,
        })
    }

    pub fn region(&self) -> &BoundingBox {
        &self.region
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lat_step(&self) -> f64 {
        self.lat_step
    }

    pub fn lon_step(&self) -> f64 {
        self.lon_step
    }

    /// Centre (lat, lon) of the cell at row-major `index`.
    pub fn center(&self, index: usize) -> (f64, f64) {
        let row = index / self.cols;
        let col = index % self.cols;
        (
            self.region.north - (row as f64 + 0.5) * self.lat_step,
            self.region.west + (col as f64 + 0.5) * self.lon_step,
        )
    }

    /// Row-major index of the cell containing (lat, lon), if inside the region.
    pub fn index_of(&self, lat: f64, lon: f64) -> Option<usize> {
        if !self.region.contains(lat, lon) {
            return None;
        }
        let (row, col) = self.clamped_row_col(lat, lon);
        Some(row * self.cols + col)
    }

    /// Nearest cell to (lat, lon) and the distance to its centre in degrees.
    ///
    /// Points outside the region snap to the closest edge cell, so callers compare
    /// the distance against their own tolerance.
    pub fn nearest(&self, lat: f64, lon: f64) -> (usize, f64) {
        let (row, col) = self.clamped_row_col(lat, lon);
        let index = row * self.cols + col;
        let (clat, clon) = self.center(index);
        (index, ((lat - clat).powi(2) + (lon - clon).powi(2)).sqrt())
    }

    fn clamped_row_col(&self, lat: f64, lon: f64) -> (usize, usize) {
        let row = ((self.region.north - lat) / self.lat_step).floor();
        let col = ((lon - self.region.west) / self.lon_step).floor();
        let row = row.clamp(0.0, (self.rows - 1) as f64) as usize;
        let col = col.clamp(0.0, (self.cols - 1) as f64) as usize;
        (row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mumbai() -> BoundingBox {
        BoundingBox::new(19.3, 18.8, 72.9, 72.7).unwrap()
    }

    #[test]
    fn test_grid_dimensions_round_up() {
        let grid = TargetGrid::new(mumbai(), 0.03).unwrap();
        // 0.5 / 0.03 = 16.67 -> 17 rows, 0.2 / 0.03 = 6.67 -> 7 cols
        assert_eq!(grid.rows(), 17);
        assert_eq!(grid.cols(), 7);
        assert!(grid.lat_step() <= 0.03);
    }

    #[test]
    fn test_exact_spans_are_not_padded() {
        // 72.9 - 72.7 is slightly above 0.2 in binary floating point
        let grid = TargetGrid::new(mumbai(), 0.01).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (50, 20));
        let small = TargetGrid::new(BoundingBox::new(19.0, 18.9, 72.9, 72.8).unwrap(), 0.05).unwrap();
        assert_eq!(small.len(), 4);
    }

    #[test]
    fn test_centers_stay_inside_region() {
        let grid = TargetGrid::new(mumbai(), 0.01).unwrap();
        for i in 0..grid.len() {
            let (lat, lon) = grid.center(i);
            assert!(mumbai().contains(lat, lon));
            assert_eq!(grid.index_of(lat, lon), Some(i));
        }
    }

    #[test]
    fn test_index_of_outside_is_none() {
        let grid = TargetGrid::new(mumbai(), 0.05).unwrap();
        assert_eq!(grid.index_of(19.4, 72.8), None);
        let (idx, dist) = grid.nearest(19.4, 72.8);
        assert!(idx < grid.cols());
        assert!(dist > 0.1);
    }

    #[test]
    fn test_rejects_bad_resolution() {
        assert!(TargetGrid::new(mumbai(), 0.0).is_err());
        assert!(TargetGrid::new(mumbai(), f64::NAN).is_err());
        assert!(TargetGrid::new(mumbai(), 1e-6).is_err());
    }
}
