//! Currency directory: country name to ISO-4217 currency code.
//!
//! The directory is stored as a TOML table of `"Country" = "CODE"` entries
//! under `[countries]`. Lookups are case-insensitive on the country name.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::is_valid_currency_code;

/// Resolves a country to the currency it uses.
pub trait CurrencyResolver {
    /// `None` when the country is unknown or maps to a malformed code.
    fn currency_for(&self, country: &str) -> Option<String>;
}

impl<F> CurrencyResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn currency_for(&self, country: &str) -> Option<String> {
        self(country)
    }
}

/// The complete country → currency table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyDirectory {
    pub countries: BTreeMap<String, String>,
}

impl CurrencyDirectory {
    /// Load a directory from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a directory from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize the directory to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Country names in sorted order.
    pub fn country_names(&self) -> Vec<&str> {
        self.countries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, country: impl Into<String>, currency: impl Into<String>) {
        self.countries.insert(country.into(), currency.into());
    }

    /// Built-in table covering the euro area and major currencies.
    pub fn default_world() -> Self {
        let entries: &[(&str, &str)] = &[
            ("Australia", "AUD"),
            ("Austria", "EUR"),
            ("Belgium", "EUR"),
            ("Brazil", "BRL"),
            ("Canada", "CAD"),
            ("China", "CNY"),
            ("Czechia", "CZK"),
            ("Denmark", "DKK"),
            ("Finland", "EUR"),
            ("France", "EUR"),
            ("Germany", "EUR"),
            ("Greece", "EUR"),
            ("Hungary", "HUF"),
            ("India", "INR"),
            ("Indonesia", "IDR"),
            ("Ireland", "EUR"),
            ("Israel", "ILS"),
            ("Italy", "EUR"),
            ("Japan", "JPY"),
            ("Mexico", "MXN"),
            ("Netherlands", "EUR"),
            ("New Zealand", "NZD"),
            ("Norway", "NOK"),
            ("Poland", "PLN"),
            ("Portugal", "EUR"),
            ("Romania", "RON"),
            ("Singapore", "SGD"),
            ("South Africa", "ZAR"),
            ("South Korea", "KRW"),
            ("Spain", "EUR"),
            ("Sweden", "SEK"),
            ("Switzerland", "CHF"),
            ("Thailand", "THB"),
            ("Turkey", "TRY"),
            ("United Kingdom", "GBP"),
            ("United States of America", "USD"),
        ];

        let countries = entries
            .iter()
            .map(|(country, code)| (country.to_string(), code.to_string()))
            .collect();
        Self { countries }
    }
}

impl Default for CurrencyDirectory {
    fn default() -> Self {
        Self::default_world()
    }
}

impl CurrencyResolver for CurrencyDirectory {
    fn currency_for(&self, country: &str) -> Option<String> {
        let code = self.countries.get(country).or_else(|| {
            self.countries
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(country))
                .map(|(_, code)| code)
        })?;
        if is_valid_currency_code(code) {
            Some(code.to_ascii_uppercase())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directory_resolves() {
        let dir = CurrencyDirectory::default_world();
        assert_eq!(dir.currency_for("France").as_deref(), Some("EUR"));
        assert_eq!(dir.currency_for("japan").as_deref(), Some("JPY"));
        assert_eq!(dir.currency_for("Atlantis"), None);
        assert!(dir.len() > 30);
    }

    #[test]
    fn malformed_code_is_unresolvable() {
        let mut dir = CurrencyDirectory::default_world();
        dir.insert("Narnia", "LION");
        assert_eq!(dir.currency_for("Narnia"), None);
    }

    #[test]
    fn toml_roundtrip() {
        let dir = CurrencyDirectory::default_world();
        let toml_str = dir.to_toml().unwrap();
        let parsed = CurrencyDirectory::from_toml(&toml_str).unwrap();
        assert_eq!(dir.len(), parsed.len());
        assert!(parsed.country_names().contains(&"Germany"));
    }

    #[test]
    fn parse_custom_table() {
        let parsed = CurrencyDirectory::from_toml(
            r#"
[countries]
"Iceland" = "ISK"
"#,
        )
        .unwrap();
        assert_eq!(parsed.currency_for("Iceland").as_deref(), Some("ISK"));
    }

    #[test]
    fn closures_are_resolvers() {
        let resolver = |c: &str| (c == "X").then(|| "XXX".to_string());
        assert_eq!(resolver.currency_for("X").as_deref(), Some("XXX"));
        assert_eq!(resolver.currency_for("Y"), None);
    }
}
