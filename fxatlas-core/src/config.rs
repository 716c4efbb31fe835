//! Application configuration (TOML).
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators::bands::DEFAULT_BAND_WIDTH;
use crate::indicators::config::{DEFAULT_BANDS_PERIOD, DEFAULT_RSI_PERIOD, DEFAULT_SMA_PERIOD};
use crate::indicators::{IndicatorKey, IndicatorSet};

/// Errors from loading configuration or directory files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chart: ChartConfig,
    pub indicators: IndicatorDefaults,
    pub storage: StorageConfig,
}

/// Chart window and rendering limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Days of history requested from the rate source.
    pub range_days: u32,
    /// Largest fraction of the available points an indicator window may cover.
    pub max_period_fraction: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            range_days: 365,
            max_period_fraction: 0.5,
        }
    }
}

/// Initial indicator periods and the band width multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorDefaults {
    pub sma_period: usize,
    pub bollinger_period: usize,
    pub bollinger_width: f64,
    pub rsi_period: usize,
}

impl Default for IndicatorDefaults {
    fn default() -> Self {
        Self {
            sma_period: DEFAULT_SMA_PERIOD,
            bollinger_period: DEFAULT_BANDS_PERIOD,
            bollinger_width: DEFAULT_BAND_WIDTH,
            rsi_period: DEFAULT_RSI_PERIOD,
        }
    }
}

impl IndicatorDefaults {
    /// Built-in indicators, inactive, with the configured periods.
    pub fn indicator_set(&self) -> IndicatorSet {
        let mut set = IndicatorSet::with_defaults();
        set.set_period(IndicatorKey::Sma, self.sma_period);
        set.set_period(IndicatorKey::Bollinger, self.bollinger_period);
        set.set_period(IndicatorKey::Rsi, self.rsi_period);
        set
    }
}

/// Where best-effort preferences are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub preferences_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            preferences_path: PathBuf::from(".fxatlas/preferences.json"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chart.range_days == 0 {
            return Err(ConfigError::Invalid {
                field: "chart.range_days",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.chart.max_period_fraction > 0.0 && self.chart.max_period_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "chart.max_period_fraction",
                reason: format!("{} is outside (0, 1]", self.chart.max_period_fraction),
            });
        }
        if !(self.indicators.bollinger_width >= 0.0 && self.indicators.bollinger_width.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "indicators.bollinger_width",
                reason: format!("{} is not a non-negative number", self.indicators.bollinger_width),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.indicators.bollinger_width, 0.5);
        assert_eq!(config.chart.range_days, 365);
    }

    #[test]
    fn partial_override() {
        let config = AppConfig::from_toml(
            r#"
[chart]
range_days = 90

[indicators]
bollinger_width = 2.0
rsi_period = 7
"#,
        )
        .unwrap();
        assert_eq!(config.chart.range_days, 90);
        assert_eq!(config.chart.max_period_fraction, 0.5);
        assert_eq!(config.indicators.bollinger_width, 2.0);
        assert_eq!(config.indicators.sma_period, 20);

        let set = config.indicators.indicator_set();
        assert_eq!(set.get(&IndicatorKey::Rsi).unwrap().period, 7);
        assert!(!set.is_active(&IndicatorKey::Rsi));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_toml("[chart]\nrange_days = 0"),
            Err(ConfigError::Invalid { field: "chart.range_days", .. })
        ));
        assert!(AppConfig::from_toml("[chart]\nmax_period_fraction = 1.5").is_err());
        assert!(AppConfig::from_toml("[indicators]\nbollinger_width = -1.0").is_err());
        assert!(matches!(
            AppConfig::from_toml("[chart\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/fxatlas.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
