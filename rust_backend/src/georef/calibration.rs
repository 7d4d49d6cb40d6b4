//! Conversion of range-validated raw values into physical units.

use serde::{Deserialize, Serialize};

/// Kelvin offset for Celsius conversion.
pub const KELVIN_OFFSET: f64 = 273.15;
/// AQI reported for concentrations beyond the last breakpoint.
pub const AQI_CEILING: f64 = 400.0;

/// One segment of a piecewise-linear concentration to AQI mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AqiBreakpoint {
    pub conc_low: f64,
    pub conc_high: f64,
    pub aqi_low: f64,
    pub aqi_high: f64,
}

impl AqiBreakpoint {
    const fn new(conc_low: f64, conc_high: f64, aqi_low: f64, aqi_high: f64) -> Self {
        Self {
            conc_low,
            conc_high,
            aqi_low,
            aqi_high,
        }
    }

    /// Indian national AQI sub-index table for NO2 (µg/m³).
    pub fn indian_no2() -> Vec<AqiBreakpoint> {
        vec![
            Self::new(0.0, 40.0, 0.0, 50.0),
            Self::new(40.0, 80.0, 51.0, 100.0),
            Self::new(80.0, 180.0, 101.0, 200.0),
            Self::new(180.0, 280.0, 201.0, 300.0),
            Self::new(280.0, 400.0, 301.0, 400.0),
        ]
    }
}

/// Linear interpolation inside the first segment containing `concentration`.
pub fn aqi_from_concentration(concentration: f64, breakpoints: &[AqiBreakpoint]) -> f64 {
    if let Some(first) = breakpoints.first() {
        if concentration < first.conc_low {
            return first.aqi_low;
        }
    }
    for bp in breakpoints {
        if concentration >= bp.conc_low && concentration <= bp.conc_high {
            let span = bp.conc_high - bp.conc_low;
            if span <= 0.0 {
                return bp.aqi_high;
            }
            return bp.aqi_low + (concentration - bp.conc_low) / span * (bp.aqi_high - bp.aqi_low);
        }
    }
    AQI_CEILING
}

/// Raw-to-physical conversion for a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Calibration {
    Identity,
    Linear {
        scale: f64,
        #[serde(default)]
        offset: f64,
    },
    KelvinToCelsius,
    /// Tropospheric column (molecules/cm²) to surface µg/m³, then to an AQI sub-index.
    No2ColumnToAqi {
        column_to_ugm3: f64,
        concentration_cap: f64,
        #[serde(default = "AqiBreakpoint::indian_no2")]
        breakpoints: Vec<AqiBreakpoint>,
    },
    /// Daily precipitation (mm) to a 0-1 flood-risk index.
    PrecipitationToFloodRisk { saturation_mm: f64 },
}

impl Calibration {
    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            Calibration::Identity => raw,
            Calibration::Linear { scale, offset } => raw * scale + offset,
            Calibration::KelvinToCelsius => raw - KELVIN_OFFSET,
            Calibration::No2ColumnToAqi {
                column_to_ugm3,
                concentration_cap,
                breakpoints,
            } => {
                let concentration = (raw * column_to_ugm3).clamp(0.0, *concentration_cap);
                aqi_from_concentration(concentration, breakpoints)
            }
            Calibration::PrecipitationToFloodRisk { saturation_mm } => {
                (raw / saturation_mm).clamp(0.0, 1.0)
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Calibration::Identity | Calibration::KelvinToCelsius => Ok(()),
            Calibration::Linear { scale, offset } => {
                if scale.is_finite() && *scale != 0.0 && offset.is_finite() {
                    Ok(())
                } else {
                    Err(format!("invalid linear calibration scale={} offset={}", scale, offset))
                }
            }
            Calibration::No2ColumnToAqi {
                column_to_ugm3,
                concentration_cap,
                breakpoints,
            } => {
                if !(*column_to_ugm3 > 0.0) || !(*concentration_cap > 0.0) {
                    return Err("NO2 conversion factor and cap must be positive".to_string());
                }
                if breakpoints.is_empty() {
                    return Err("AQI breakpoint table is empty".to_string());
                }
                for pair in breakpoints.windows(2) {
                    if pair[1].conc_low < pair[0].conc_high || pair[1].aqi_low < pair[0].aqi_high {
                        return Err("AQI breakpoints must be ascending".to_string());
                    }
                }
                Ok(())
            }
            Calibration::PrecipitationToFloodRisk { saturation_mm } => {
                if *saturation_mm > 0.0 {
                    Ok(())
                } else {
                    Err("saturation_mm must be positive".to_string())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_kelvin_to_celsius() {
        assert_close(Calibration::KelvinToCelsius.apply(305.15), 32.0);
    }

    #[test]
    fn test_aqi_breakpoints() {
        let table = AqiBreakpoint::indian_no2();
        assert_close(aqi_from_concentration(0.0, &table), 0.0);
        assert_close(aqi_from_concentration(40.0, &table), 50.0);
        assert_close(aqi_from_concentration(60.0, &table), 75.5);
        assert_close(aqi_from_concentration(130.0, &table), 150.5);
        assert_close(aqi_from_concentration(500.0, &table), AQI_CEILING);
    }

    #[test]
    fn test_no2_column_conversion_is_capped() {
        let cal = Calibration::No2ColumnToAqi {
            column_to_ugm3: 2.0e-14,
            concentration_cap: 200.0,
            breakpoints: AqiBreakpoint::indian_no2(),
        };
        // 2.5e15 molecules/cm² -> 50 µg/m³ -> 51 + 10/40 * 49
        assert_close(cal.apply(2.5e15), 63.25);
        // a huge column is capped at 200 µg/m³ -> 201 + 20/100 * 99
        assert_close(cal.apply(1.0e17), 220.8);
    }

    #[test]
    fn test_flood_risk_is_clipped() {
        let cal = Calibration::PrecipitationToFloodRisk { saturation_mm: 50.0 };
        assert_close(cal.apply(25.0), 0.5);
        assert_close(cal.apply(120.0), 1.0);
    }

    #[test]
    fn test_validation() {
        assert!(Calibration::Linear { scale: 0.0, offset: 0.0 }.validate().is_err());
        assert!(Calibration::PrecipitationToFloodRisk { saturation_mm: 0.0 }
            .validate()
            .is_err());
        let unordered = Calibration::No2ColumnToAqi {
            column_to_ugm3: 1.0,
            concentration_cap: 1.0,
            breakpoints: vec![
                AqiBreakpoint::new(40.0, 80.0, 51.0, 100.0),
                AqiBreakpoint::new(0.0, 40.0, 0.0, 50.0),
            ],
        };
        assert!(unordered.validate().is_err());
    }

    #[test]
    fn test_toml_tagged_form() {
        let cal: Calibration =
            toml::from_str("kind = \"no2_column_to_aqi\"\ncolumn_to_ugm3 = 2e-14\nconcentration_cap = 200.0")
                .unwrap();
        assert_eq!(
            cal,
            Calibration::No2ColumnToAqi {
                column_to_ugm3: 2e-14,
                concentration_cap: 200.0,
                breakpoints: AqiBreakpoint::indian_no2(),
            }
        );
    }
}
