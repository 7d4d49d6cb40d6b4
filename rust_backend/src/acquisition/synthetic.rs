//! Deterministic synthetic data, the terminal acquisition tier.
//!
//! Values are generated in raw sensor units so synthetic grids flow through the same
//! quality, calibration and resampling stages as real ones. The same seed, dataset and
//! region always produce the same grid.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::config::{DatasetSpec, SyntheticLayout, SyntheticProfile};
use crate::core::{
    BoundingBox, NativeLayout, PipelineError, PipelineResult, PointSample, Provenance,
    RawObservationGrid, RegularLayout,
};

/// Source name recorded in synthetic provenance tags.
pub const SYNTHETIC_SOURCE: &str = "synthetic-generator";

#[derive(Debug, Clone, Copy)]
pub struct SyntheticGenerator {
    seed: u64,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Per-dataset RNG; stable across platforms and runs.
    fn rng_for(&self, dataset: &str) -> ChaCha8Rng {
        let digest = Sha256::digest(dataset.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        ChaCha8Rng::seed_from_u64(self.seed ^ u64::from_le_bytes(bytes))
    }

    /// Generate a grid for `dataset` over `region`.
    ///
    /// Grids cover the exact region; swaths scatter over the region padded by
    /// `padding` degrees; point sets stay inside the region.
    ///
    /// # Errors
    /// A degenerate profile (no samples, non-finite or negative parameters) is a
    /// [`PipelineError::SyntheticGenerator`], the only fatal acquisition failure.
    pub fn generate(
        &self,
        dataset: &str,
        spec: &DatasetSpec,
        region: &BoundingBox,
        padding: f64,
        captured_at: DateTime<Utc>,
    ) -> PipelineResult<RawObservationGrid> {
        let profile = &spec.synthetic;
        validate_profile(dataset, profile)?;

        let mut rng = self.rng_for(dataset);
        let field = ValueField {
            profile,
            region,
            min: spec.valid_range.min,
            max: spec.valid_range.max,
        };

        let layout = match profile.layout {
            SyntheticLayout::Grid => {
                let n = profile.samples;
                let lat_step = region.lat_span() / n as f64;
                let lon_step = region.lon_span() / n as f64;
                let north = region.north - lat_step / 2.0;
                let west = region.west + lon_step / 2.0;
                let mut values = Vec::with_capacity(n * n);
                for row in 0..n {
                    for col in 0..n {
                        let lat = north - row as f64 * lat_step;
                        let lon = west + col as f64 * lon_step;
                        values.push(field.sample(&mut rng, lat, lon));
                    }
                }
                NativeLayout::Regular(RegularLayout {
                    north,
                    west,
                    lat_step,
                    lon_step,
                    rows: n,
                    cols: n,
                    flags: vec![0; values.len()],
                    values,
                })
            }
            SyntheticLayout::Swath => {
                let padded = region.expanded(padding);
                NativeLayout::Swath(scatter(&mut rng, &field, &padded, profile.samples))
            }
            SyntheticLayout::Points => {
                NativeLayout::Points(scatter(&mut rng, &field, region, profile.samples))
            }
        };

        Ok(RawObservationGrid::new(
            dataset,
            layout,
            captured_at,
            Provenance::synthetic(SYNTHETIC_SOURCE),
        ))
    }
}

fn validate_profile(dataset: &str, profile: &SyntheticProfile) -> PipelineResult<()> {
    if profile.samples == 0 {
        return Err(PipelineError::synthetic("profile has zero samples", dataset));
    }
    if !profile.base.is_finite() || !profile.center_boost.is_finite() {
        return Err(PipelineError::synthetic("profile values must be finite", dataset));
    }
    if !profile.variation.is_finite() || profile.variation < 0.0 {
        return Err(PipelineError::synthetic(
            format!("invalid variation {}", profile.variation),
            dataset,
        ));
    }
    Ok(())
}

/// Base value plus a centre boost fading linearly to the region edges, plus noise.
struct ValueField<'a> {
    profile: &'a SyntheticProfile,
    region: &'a BoundingBox,
    min: f64,
    max: f64,
}

impl ValueField<'_> {
    fn sample(&self, rng: &mut ChaCha8Rng, lat: f64, lon: f64) -> f64 {
        let (center_lat, center_lon) = self.region.center();
        let d_lat = (lat - center_lat).abs() / (self.region.lat_span() / 2.0);
        let d_lon = (lon - center_lon).abs() / (self.region.lon_span() / 2.0);
        let proximity = (1.0 - d_lat.max(d_lon)).clamp(0.0, 1.0);
        let noise = if self.profile.variation > 0.0 {
            rng.gen_range(-self.profile.variation..=self.profile.variation)
        } else {
            0.0
        };
        (self.profile.base + self.profile.center_boost * proximity + noise).clamp(self.min, self.max)
    }
}

fn scatter(
    rng: &mut ChaCha8Rng,
    field: &ValueField<'_>,
    area: &BoundingBox,
    count: usize,
) -> Vec<PointSample> {
    (0..count)
        .map(|_| {
            let lat = rng.gen_range(area.south..=area.north);
            let lon = rng.gen_range(area.west..=area.east);
            PointSample {
                lat,
                lon,
                value: field.sample(rng, lat, lon),
                flag: 0,
            }
        })
        .collect()
}
