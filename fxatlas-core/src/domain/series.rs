//! One dated exchange rate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single observation of `quote per 1 base` on a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub rate: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, rate: f64) -> Self {
        Self { date, rate }
    }
}

/// Extract the rate column, preserving order.
pub fn rates(series: &[TimeSeriesPoint]) -> Vec<f64> {
    series.iter().map(|p| p.rate).collect()
}

/// Extract ISO date labels (`YYYY-MM-DD`), preserving order.
pub fn labels(series: &[TimeSeriesPoint]) -> Vec<String> {
    series
        .iter()
        .map(|p| p.date.format("%Y-%m-%d").to_string())
        .collect()
}
