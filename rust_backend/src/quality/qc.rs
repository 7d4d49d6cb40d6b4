//! Quality-control masks for raw observation grids.
//!
//! Flags are small integer codes where 0 is best. The filter starts at the strictest
//! tolerance and relaxes one level at a time until enough pixels pass, never beyond
//! the configured maximum.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::{DatasetSpec, QualityConfig};
use crate::core::RawObservationGrid;
use crate::fallback::{Fallback, Step};

/// How a dataset packs quality information into its flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagEncoding {
    /// The flag is an ordinal code; accept when `flag <= tolerance`.
    #[default]
    Ordinal,
    /// MOD11A1-style QC bitfield.
    ///
    /// Bits 0-1 hold the mandatory QA, bits 2-3 the data-quality class and bit 5
    /// the LST error flag.
    ModisLst,
}

const MODIS_MANDATORY_MASK: u8 = 0b0000_0011;
const MODIS_DATA_QUALITY_SHIFT: u8 = 2;
const MODIS_DATA_QUALITY_MASK: u8 = 0b0000_0011;
const MODIS_LST_ERROR_BIT: u8 = 0b0010_0000;

impl FlagEncoding {
    /// Whether a pixel with `flag` is acceptable at `tolerance`.
    pub fn accepts(&self, flag: u8, tolerance: u8) -> bool {
        match self {
            FlagEncoding::Ordinal => flag <= tolerance,
            FlagEncoding::ModisLst => {
                let mandatory = flag & MODIS_MANDATORY_MASK;
                let data_quality = (flag >> MODIS_DATA_QUALITY_SHIFT) & MODIS_DATA_QUALITY_MASK;
                let lst_error = flag & MODIS_LST_ERROR_BIT != 0;

                let mandatory_limit = if tolerance > 2 { 2 } else { 1 };
                let quality_limit = if tolerance > 1 { 2 } else { 1 };

                mandatory <= mandatory_limit && data_quality <= quality_limit && !lst_error
            }
        }
    }
}

/// Validity mask produced by the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityMask {
    pub valid: Vec<bool>,
    /// Tolerance level the mask was built at.
    pub tolerance: u8,
    pub accepted: usize,
    /// Set when even the loosest tolerance fell short of the threshold.
    pub insufficient_coverage: bool,
}

impl QualityMask {
    pub fn is_valid(&self, index: usize) -> bool {
        self.valid.get(index).copied().unwrap_or(false)
    }
}

/// Applies a flag encoding with a relaxing tolerance ladder.
#[derive(Debug, Clone)]
pub struct QualityFilter {
    encoding: FlagEncoding,
    min_valid_pixels: usize,
    min_tolerance: u8,
    max_tolerance: u8,
}

impl QualityFilter {
    pub fn new(
        encoding: FlagEncoding,
        min_valid_pixels: usize,
        min_tolerance: u8,
        max_tolerance: u8,
    ) -> Self {
        Self {
            encoding,
            min_valid_pixels,
            min_tolerance,
            max_tolerance: max_tolerance.max(min_tolerance),
        }
    }

    pub fn for_dataset(spec: &DatasetSpec, quality: &QualityConfig) -> Self {
        Self::new(
            spec.flag_encoding,
            spec.min_valid_pixels,
            quality.min_tolerance,
            quality.max_tolerance,
        )
    }

    /// Mask at a single tolerance level. Non-finite raw values (fill) never pass.
    pub fn mask_at(&self, grid: &RawObservationGrid, tolerance: u8) -> QualityMask {
        let valid: Vec<bool> = (0..grid.len())
            .map(|i| grid.value(i).is_finite() && self.encoding.accepts(grid.flag(i), tolerance))
            .collect();
        let accepted = valid.iter().filter(|v| **v).count();
        QualityMask {
            valid,
            tolerance,
            accepted,
            insufficient_coverage: false,
        }
    }

    /// Strictest mask that meets the threshold, or the loosest one flagged insufficient.
    pub fn apply(&self, grid: &RawObservationGrid) -> QualityMask {
        let ladder = Fallback::new(self.min_tolerance..=self.max_tolerance);
        let outcome = ladder.run(|&tolerance| {
            let mask = self.mask_at(grid, tolerance);
            if mask.accepted >= self.min_valid_pixels {
                Step::Accept(mask)
            } else {
                let reason = format!(
                    "{} valid pixels at tolerance {} (need {})",
                    mask.accepted, tolerance, self.min_valid_pixels
                );
                Step::reject_with(mask, reason)
            }
        });

        match outcome.accepted_or_partial() {
            Some((tolerance, mask, true)) => {
                debug!(
                    "QC for '{}' accepted {} pixels at tolerance {}",
                    grid.dataset, mask.accepted, tolerance
                );
                mask
            }
            Some((_, mut mask, false)) => {
                warn!(
                    "QC for '{}' reached max tolerance {} with only {} valid pixels",
                    grid.dataset, mask.tolerance, mask.accepted
                );
                mask.insufficient_coverage = true;
                mask
            }
            None => QualityMask {
                valid: vec![false; grid.len()],
                tolerance: self.max_tolerance,
                accepted: 0,
                insufficient_coverage: true,
            },
        }
    }
}
