//! Rate source trait and structured error types.
//!
//! The RateSource trait abstracts over where exchange-rate history comes from
//! (CSV exports, an in-memory table, a synthetic random walk) so the session
//! and worker can swap implementations and mock for tests. Retry policy, if
//! any, belongs to the implementation; the core never retries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::TimeSeriesPoint;

/// Structured error types for rate fetches.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("response format changed: {0}")]
    Format(String),

    #[error("no series for {base}/{quote}")]
    PairNotFound { base: String, quote: String },

    #[error("I/O error: {0}")]
    Io(String),
}

/// Trait for rate sources.
pub trait RateSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Daily `quote per 1 base` for the last `range_days` days, oldest first.
    fn fetch_series(
        &self,
        base: &str,
        quote: &str,
        range_days: u32,
    ) -> Result<Vec<TimeSeriesPoint>, RateError>;
}

/// Parse an ISO date string as sent by rate providers.
pub fn parse_date(s: &str) -> Result<NaiveDate, RateError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| RateError::Format(format!("bad date '{s}': {e}")))
}

/// Reject non-positive or non-finite rates.
pub fn validate_series(points: &[TimeSeriesPoint]) -> Result<(), RateError> {
    match points.iter().find(|p| !(p.rate.is_finite() && p.rate > 0.0)) {
        Some(bad) => Err(RateError::Format(format!(
            "invalid rate {} on {}",
            bad.rate, bad.date
        ))),
        None => Ok(()),
    }
}

/// Validate, sort by date, drop duplicate dates and keep the trailing
/// `range_days` window ending at the last observation.
pub fn normalize_series(
    mut points: Vec<TimeSeriesPoint>,
    range_days: u32,
) -> Result<Vec<TimeSeriesPoint>, RateError> {
    validate_series(&points)?;
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);

    let start = points
        .last()
        .and_then(|p| p.date.checked_sub_signed(Duration::days(i64::from(range_days))));
    if let Some(start) = start {
        points.retain(|p| p.date > start);
    }
    Ok(points)
}

// ── CSV ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    rate: f64,
}

/// Reads `BASE_QUOTE.csv` files with a `date,rate` header from a directory.
///
/// When only the inverse pair exists, its rates are inverted.
#[derive(Debug, Clone)]
pub struct CsvRateSource {
    dir: PathBuf,
}

impl CsvRateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn pair_path(&self, base: &str, quote: &str) -> PathBuf {
        self.dir.join(format!("{base}_{quote}.csv"))
    }

    fn read_file(path: &Path) -> Result<Vec<TimeSeriesPoint>, RateError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| RateError::Io(e.to_string()))?;
        let mut points = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|e| RateError::Format(e.to_string()))?;
            points.push(TimeSeriesPoint::new(parse_date(&row.date)?, row.rate));
        }
        Ok(points)
    }
}

impl RateSource for CsvRateSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_series(
        &self,
        base: &str,
        quote: &str,
        range_days: u32,
    ) -> Result<Vec<TimeSeriesPoint>, RateError> {
        let direct = self.pair_path(base, quote);
        let points = if direct.exists() {
            Self::read_file(&direct)?
        } else {
            let inverse = self.pair_path(quote, base);
            if !inverse.exists() {
                return Err(RateError::PairNotFound {
                    base: base.to_string(),
                    quote: quote.to_string(),
                });
            }
            let points = Self::read_file(&inverse)?;
            // Validate before inverting so a zero rate is a format error
            validate_series(&points)?;
            points
                .into_iter()
                .map(|p| TimeSeriesPoint::new(p.date, 1.0 / p.rate))
                .collect()
        };
        tracing::debug!(base, quote, points = points.len(), "csv series loaded");
        normalize_series(points, range_days)
    }
}

// ── In-memory ────────────────────────────────────────────────────────

/// Fixed series keyed by `(base, quote)`, for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticRateSource {
    series: HashMap<(String, String), Result<Vec<TimeSeriesPoint>, RateError>>,
}

impl StaticRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(
        mut self,
        base: &str,
        quote: &str,
        points: Vec<TimeSeriesPoint>,
    ) -> Self {
        self.series
            .insert((base.to_string(), quote.to_string()), Ok(points));
        self
    }

    /// Make a pair fail with `error`.
    pub fn with_error(mut self, base: &str, quote: &str, error: RateError) -> Self {
        self.series
            .insert((base.to_string(), quote.to_string()), Err(error));
        self
    }
}

impl RateSource for StaticRateSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_series(
        &self,
        base: &str,
        quote: &str,
        range_days: u32,
    ) -> Result<Vec<TimeSeriesPoint>, RateError> {
        match self.series.get(&(base.to_string(), quote.to_string())) {
            Some(Ok(points)) => normalize_series(points.clone(), range_days),
            Some(Err(e)) => Err(e.clone()),
            None => Err(RateError::PairNotFound {
                base: base.to_string(),
                quote: quote.to_string(),
            }),
        }
    }
}

// ── Synthetic ────────────────────────────────────────────────────────

/// Deterministic random walk per currency pair, weekdays only.
///
/// The walk is seeded from the pair name so repeated fetches agree. A pair
/// with identical legs is flat at 1.0.
#[derive(Debug, Clone)]
pub struct SyntheticRateSource {
    end: NaiveDate,
}

impl SyntheticRateSource {
    pub fn new(end: NaiveDate) -> Self {
        Self { end }
    }

    /// Series ending today.
    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }
}

impl RateSource for SyntheticRateSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_series(
        &self,
        base: &str,
        quote: &str,
        range_days: u32,
    ) -> Result<Vec<TimeSeriesPoint>, RateError> {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        // Deterministic seed from pair name
        let seed_bytes = blake3::hash(format!("{base}/{quote}").as_bytes());
        let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

        let same = base.eq_ignore_ascii_case(quote);
        let mut rate: f64 = if same { 1.0 } else { rng.gen_range(0.5..2.0) };

        let mut points = Vec::new();
        let Some(mut current) = self
            .end
            .checked_sub_signed(Duration::days(i64::from(range_days) - 1))
        else {
            return Err(RateError::Format(format!("range of {range_days} days is out of bounds")));
        };
        while current <= self.end {
            let weekday = current.weekday();
            if weekday != chrono::Weekday::Sat && weekday != chrono::Weekday::Sun {
                if !same {
                    let daily_return: f64 = rng.gen_range(-0.005..0.005);
                    rate *= 1.0 + daily_return;
                }
                points.push(TimeSeriesPoint::new(current, rate));
            }
            current += Duration::days(1);
        }
        Ok(points)
    }
}
