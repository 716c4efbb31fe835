//! Preference persistence (JSON) across restarts.
//!
//! Best effort: a missing or corrupt file loads defaults. Restoring goes
//! through the normal mutation paths, so a hand-edited file cannot push the
//! state past its caps.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators::IndicatorSet;
use crate::session::ChartSession;
use crate::store::StatePatch;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializable subset of state that persists across restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedPreferences {
    pub is_premium_user: bool,
    /// Manually added overlay currencies, in order.
    pub overlays: Vec<String>,
    pub indicators: IndicatorSet,
}

/// Load preferences from disk. Returns defaults if the file is missing or corrupt.
pub fn load(path: &Path) -> PersistedPreferences {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "corrupt preferences, using defaults");
            PersistedPreferences::default()
        }),
        Err(_) => PersistedPreferences::default(),
    }
}

/// Save preferences to disk. Creates parent directories if needed.
pub fn save(path: &Path, prefs: &PersistedPreferences) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(prefs)?;
    std::fs::write(path, json)?;
    tracing::debug!(path = %path.display(), "preferences saved");
    Ok(())
}

/// Extract preferences from a session. Destination-derived overlays are
/// rebuilt from the selection and are not saved.
pub fn extract(session: &ChartSession) -> PersistedPreferences {
    let state = session.store().get();
    PersistedPreferences {
        is_premium_user: state.is_premium_user,
        overlays: state
            .active_overlays
            .into_iter()
            .filter(|o| !o.is_from_destinations)
            .map(|o| o.currency)
            .collect(),
        indicators: state.active_indicators,
    }
}

/// Apply preferences to a session. Overlays that the caps reject are
/// dropped; saved indicator configs replace the session's per key.
pub fn apply(session: &mut ChartSession, prefs: PersistedPreferences) {
    let mut indicators = session.store().active_indicators();
    for (key, config) in prefs.indicators.iter() {
        indicators.insert(key.clone(), config.clone());
    }
    session.store().set(
        StatePatch::new()
            .is_premium_user(prefs.is_premium_user)
            .active_indicators(indicators),
    );

    for currency in &prefs.overlays {
        if !session.add_overlay(currency) {
            tracing::debug!(%currency, "saved overlay not restored");
        }
    }
}
