//! Per-indicator activation and configuration bookkeeping.
//!
//! Configs live for the whole chart session: they are toggled on and off but
//! never removed. Unknown keys are created lazily with a default period.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default SMA window.
pub const DEFAULT_SMA_PERIOD: usize = 20;
/// Default volatility band window.
pub const DEFAULT_BANDS_PERIOD: usize = 20;
/// Default momentum oscillator window.
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Indicator identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndicatorKey {
    Sma,
    Bollinger,
    Rsi,
    /// Any other key a caller toggles; carried but not computed.
    Custom(String),
}

impl IndicatorKey {
    pub const BUILTIN: [IndicatorKey; 3] = [IndicatorKey::Sma, IndicatorKey::Bollinger, IndicatorKey::Rsi];

    pub fn as_str(&self) -> &str {
        match self {
            IndicatorKey::Sma => "sma",
            IndicatorKey::Bollinger => "bollinger",
            IndicatorKey::Rsi => "rsi",
            IndicatorKey::Custom(s) => s,
        }
    }

    /// Period used when the key is first seen.
    pub fn default_period(&self) -> usize {
        match self {
            IndicatorKey::Sma | IndicatorKey::Custom(_) => DEFAULT_SMA_PERIOD,
            IndicatorKey::Bollinger => DEFAULT_BANDS_PERIOD,
            IndicatorKey::Rsi => DEFAULT_RSI_PERIOD,
        }
    }

    pub fn default_color(&self) -> &'static str {
        match self {
            IndicatorKey::Sma => "#ff9f40",
            IndicatorKey::Bollinger => "#9966ff",
            IndicatorKey::Rsi => "#4bc0c0",
            IndicatorKey::Custom(_) => "#c9cbcf",
        }
    }
}

impl From<&str> for IndicatorKey {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "sma" => IndicatorKey::Sma,
            "bollinger" | "bands" => IndicatorKey::Bollinger,
            "rsi" | "momentum" => IndicatorKey::Rsi,
            _ => IndicatorKey::Custom(s.to_string()),
        }
    }
}

impl From<String> for IndicatorKey {
    fn from(s: String) -> Self {
        IndicatorKey::from(s.as_str())
    }
}

impl From<IndicatorKey> for String {
    fn from(key: IndicatorKey) -> Self {
        key.as_str().to_string()
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activation flag, window and display color for one indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub active: bool,
    pub period: usize,
    pub color: String,
}

impl IndicatorConfig {
    pub fn for_key(key: &IndicatorKey) -> Self {
        Self {
            active: false,
            period: key.default_period(),
            color: key.default_color().to_string(),
        }
    }

    /// The window actually used when rendering over `data_len` points.
    ///
    /// This is the only place a period is clamped: it is limited to
    /// `max_fraction` of the available data (at least 1). The stored
    /// `period` is left untouched.
    pub fn effective_period(&self, data_len: usize, max_fraction: f64) -> usize {
        let cap = ((data_len as f64) * max_fraction).floor() as usize;
        self.period.min(cap.max(1)).max(1)
    }
}

/// All indicator configs for a chart session, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorSet {
    configs: BTreeMap<IndicatorKey, IndicatorConfig>,
}

impl IndicatorSet {
    /// Set with the three built-in indicators, all inactive.
    pub fn with_defaults() -> Self {
        let mut set = Self::default();
        for key in IndicatorKey::BUILTIN {
            set.configs.insert(key.clone(), IndicatorConfig::for_key(&key));
        }
        set
    }

    /// Flip `active` and return the new state. Unknown keys are created first.
    pub fn toggle(&mut self, key: impl Into<IndicatorKey>) -> bool {
        let key = key.into();
        let config = self
            .configs
            .entry(key.clone())
            .or_insert_with(|| IndicatorConfig::for_key(&key));
        config.active = !config.active;
        tracing::debug!(indicator = %key, active = config.active, "indicator toggled");
        config.active
    }

    /// Set the stored period. Unknown keys are created inactive.
    pub fn set_period(&mut self, key: impl Into<IndicatorKey>, period: usize) {
        let key = key.into();
        self.configs
            .entry(key.clone())
            .or_insert_with(|| IndicatorConfig::for_key(&key))
            .period = period;
    }

    /// Replace the config for `key` wholesale.
    pub fn insert(&mut self, key: IndicatorKey, config: IndicatorConfig) {
        self.configs.insert(key, config);
    }

    pub fn get(&self, key: &IndicatorKey) -> Option<&IndicatorConfig> {
        self.configs.get(key)
    }

    pub fn is_active(&self, key: &IndicatorKey) -> bool {
        self.configs.get(key).is_some_and(|c| c.active)
    }

    /// Active indicators in key order.
    pub fn active(&self) -> impl Iterator<Item = (&IndicatorKey, &IndicatorConfig)> {
        self.configs.iter().filter(|(_, c)| c.active)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndicatorKey, &IndicatorConfig)> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
