//! Volatility bands: moving average +/- a multiple of the standard deviation.
//!
//! Three bands:
//! - Middle: SMA(rate, period)
//! - Upper: middle + width * stddev(rate, period)
//! - Lower: middle - width * stddev(rate, period)
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.
//!
//! The default width is 0.5, which is much narrower than the customary 2.0.
//! It is kept as the documented default and is configurable.

use serde::{Deserialize, Serialize};

use super::{finite_sum, Indicator, IndicatorOutput};

/// Default width multiplier applied to the standard deviation.
pub const DEFAULT_BAND_WIDTH: f64 = 0.5;

/// Which band to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Upper,
    Middle,
    Lower,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Upper, Band::Middle, Band::Lower];

    pub fn label(self) -> &'static str {
        match self {
            Band::Upper => "upper",
            Band::Middle => "middle",
            Band::Lower => "lower",
        }
    }
}

/// All three bands over the same input.
#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    pub upper: IndicatorOutput,
    pub middle: IndicatorOutput,
    pub lower: IndicatorOutput,
}

impl Bands {
    pub fn band(&self, band: Band) -> &IndicatorOutput {
        match band {
            Band::Upper => &self.upper,
            Band::Middle => &self.middle,
            Band::Lower => &self.lower,
        }
    }
}

/// Single-band view for the [`Indicator`] trait.
#[derive(Debug, Clone)]
pub struct VolatilityBands {
    period: usize,
    width: f64,
    band: Band,
    name: String,
}

impl VolatilityBands {
    pub fn new(period: usize, width: f64, band: Band) -> Self {
        Self {
            period,
            width,
            band,
            name: format!("bands_{}_{period}_{width}", band.label()),
        }
    }

    pub fn upper(period: usize, width: f64) -> Self {
        Self::new(period, width, Band::Upper)
    }

    pub fn middle(period: usize, width: f64) -> Self {
        Self::new(period, width, Band::Middle)
    }

    pub fn lower(period: usize, width: f64) -> Self {
        Self::new(period, width, Band::Lower)
    }
}

impl Indicator for VolatilityBands {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, data: &[f64]) -> IndicatorOutput {
        let bands = volatility_bands(data, self.period, self.width);
        match self.band {
            Band::Upper => bands.upper,
            Band::Middle => bands.middle,
            Band::Lower => bands.lower,
        }
    }
}

/// Compute upper, middle and lower bands in one pass.
///
/// Warmup is identical to [`super::sma`]. A negative `width` swaps the
/// meaning of upper and lower; callers should pass a non-negative value.
pub fn volatility_bands(data: &[f64], period: usize, width: f64) -> Bands {
    let n = data.len();
    let mut bands = Bands {
        upper: vec![None; n],
        middle: vec![None; n],
        lower: vec![None; n],
    };

    if period == 0 || n < period {
        return bands;
    }

    for i in (period - 1)..n {
        let window = &data[(i + 1 - period)..=i];
        let Some(sum) = finite_sum(window) else {
            continue;
        };

        let mean = sum / period as f64;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        bands.middle[i] = Some(mean);
        bands.upper[i] = Some(mean + width * stddev);
        bands.lower[i] = Some(mean - width * stddev);
    }

    bands
}
