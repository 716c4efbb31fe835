//! Domain types for FX Atlas

pub mod country;
pub mod series;

pub use country::{Country, MapMode};
pub use series::{labels, rates, TimeSeriesPoint};

/// ISO-4217 currency code (e.g. "EUR").
pub type CurrencyCode = String;

/// True when `code` looks like an ISO-4217 code: exactly three ASCII letters.
pub fn is_valid_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}
