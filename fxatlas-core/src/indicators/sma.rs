//! Simple Moving Average (SMA).
//!
//! Rolling mean of the rate over a trailing window.
//! Lookback: period - 1 (first valid value at index period-1).

use super::{finite_sum, Indicator, IndicatorOutput};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, data: &[f64]) -> IndicatorOutput {
        sma(data, self.period)
    }
}

/// SMA over `data` with a trailing window of `period` points.
///
/// Output length equals input length. Entries `0..period-1` are `None`.
/// A window containing a non-finite value yields `None` at that index.
pub fn sma(data: &[f64], period: usize) -> IndicatorOutput {
    let n = data.len();
    let mut result = vec![None; n];

    if period == 0 || n < period {
        return result;
    }

    // Rolling sum, rescanned whenever a non-finite value is in or near the window.
    let mut sum = finite_sum(&data[..period]);
    result[period - 1] = sum.map(|s| s / period as f64);

    for i in period..n {
        let leaving = data[i - period];
        let entering = data[i];
        sum = match sum {
            Some(s) if leaving.is_finite() && entering.is_finite() => Some(s - leaving + entering),
            _ => finite_sum(&data[(i + 1 - period)..=i]),
        };
        result[i] = sum.map(|s| s / period as f64);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_slot;

    #[test]
    fn sma_3_basic() {
        let result = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(result.len(), 5);
        assert!(result[0].is_none());
        assert!(result[1].is_none());
        assert_slot(result[2], 2.0);
        assert_slot(result[3], 3.0);
        assert_slot(result[4], 4.0);
    }

    #[test]
    fn sma_5_rolls_forward() {
        let data = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0];
        let result = Sma::new(5).compute(&data);
        for slot in result.iter().take(4) {
            assert!(slot.is_none());
        }
        // SMA[4] = mean(10,11,12,13,14) = 12.0
        assert_slot(result[4], 12.0);
        assert_slot(result[5], 13.0);
        assert_slot(result[6], 14.0);
    }

    #[test]
    fn sma_1_is_identity() {
        let result = sma(&[1.1, 1.2, 1.3], 1);
        assert_slot(result[0], 1.1);
        assert_slot(result[1], 1.2);
        assert_slot(result[2], 1.3);
    }

    #[test]
    fn sma_too_few_points() {
        let result = sma(&[1.0, 2.0], 5);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn sma_zero_period_is_all_none() {
        let result = sma(&[1.0, 2.0, 3.0], 0);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn sma_nan_window_is_none() {
        let data = [10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0];
        let result = sma(&data, 3);
        // Windows touching index 2 are void
        assert!(result[2].is_none());
        assert!(result[3].is_none());
        assert!(result[4].is_none());
        // [13,14,15] → 14.0
        assert_slot(result[5], 14.0);
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20).lookback(), 19);
        assert_eq!(Sma::new(1).lookback(), 0);
        assert_eq!(Sma::new(0).lookback(), 0);
        assert_eq!(Sma::new(20).name(), "sma_20");
    }
}
