//! Indicator engine. Pure numeric functions over a rate series.
//!
//! Every indicator takes the rate column (`&[f64]`, oldest first) and returns
//! an output of the same length. Leading entries that lack enough history are
//! `None` (warmup). A series shorter than the required window produces an
//! all-`None` output rather than an error.
//!
//! The engine never clamps `period` to the available data; callers that want
//! a clamped window go through [`IndicatorConfig::effective_period`].
//!
//! Multi-series indicators (volatility bands) are exposed both as a single
//! function returning all bands and as separate named instances per band,
//! keeping the single-series [`Indicator`] trait unchanged.

pub mod bands;
pub mod config;
pub mod momentum;
pub mod sma;

pub use bands::{volatility_bands, Band, Bands, VolatilityBands, DEFAULT_BAND_WIDTH};
pub use config::{IndicatorConfig, IndicatorKey, IndicatorSet};
pub use momentum::{momentum_oscillator, MomentumOscillator};
pub use sma::{sma, Sma};

/// Output of a single indicator series: one slot per input point.
pub type IndicatorOutput = Vec<Option<f64>>;

/// Trait for single-series indicators.
///
/// `compute` returns a vector of the same length as `data`. The first
/// `lookback()` values are `None`.
pub trait Indicator {
    /// Human-readable name (e.g., "sma_20", "bands_upper_20").
    fn name(&self) -> &str;

    /// Number of leading points without a value.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the entire series.
    fn compute(&self, data: &[f64]) -> IndicatorOutput;
}

/// Sum of a window, or `None` if any value in it is not finite.
pub(crate) fn finite_sum(window: &[f64]) -> Option<f64> {
    let mut sum = 0.0;
    for &v in window {
        if !v.is_finite() {
            return None;
        }
        sum += v;
    }
    Some(sum)
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Unwrap a computed slot and compare it.
#[cfg(test)]
pub fn assert_slot(actual: Option<f64>, expected: f64) {
    match actual {
        Some(v) => assert_approx(v, expected, DEFAULT_EPSILON),
        None => panic!("expected Some({expected}), got None"),
    }
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
