//! Momentum oscillator (RSI-style, bounded 0..=100).
//!
//! Average gain and average loss are plain means over the trailing `period`
//! changes (no Wilder smoothing).
//! value = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period (the first change has no predecessor).
//! Edge case: avg_loss == 0 → 100.

use super::{Indicator, IndicatorOutput};

#[derive(Debug, Clone)]
pub struct MomentumOscillator {
    period: usize,
    name: String,
}

impl MomentumOscillator {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for MomentumOscillator {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, data: &[f64]) -> IndicatorOutput {
        momentum_oscillator(data, self.period)
    }
}

/// Momentum oscillator over `data` with a trailing window of `period` changes.
///
/// Entries `0..period` are `None`; fewer than `period + 1` points gives an
/// all-`None` output.
pub fn momentum_oscillator(data: &[f64], period: usize) -> IndicatorOutput {
    let n = data.len();
    let mut result = vec![None; n];

    if period == 0 || n < period + 1 {
        return result;
    }

    // changes[i] = data[i] - data[i-1]; index 0 has no predecessor
    let changes: Vec<f64> = (1..n).map(|i| data[i] - data[i - 1]).collect();

    for i in period..n {
        // changes for data indices i-period+1..=i live at changes[i-period..i]
        let window = &changes[(i - period)..i];
        if window.iter().any(|c| !c.is_finite()) {
            continue;
        }

        let mut gain = 0.0;
        let mut loss = 0.0;
        for &ch in window {
            if ch > 0.0 {
                gain += ch;
            } else {
                loss -= ch;
            }
        }
        let avg_gain = gain / period as f64;
        let avg_loss = loss / period as f64;

        result[i] = Some(oscillator_value(avg_gain, avg_loss));
    }

    result
}

fn oscillator_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
