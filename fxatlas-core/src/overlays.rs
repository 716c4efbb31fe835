//! Overlay bookkeeping for secondary currency series drawn next to the main pair.
//!
//! The overlay list itself lives in the [`StateStore`]; every mutation builds
//! a new list and writes it back in one `set`. `OverlaySet` only owns the
//! color counter.
//!
//! Invariants:
//! - no two overlays share a currency code;
//! - at most [`MAX_OVERLAYS_VISIBLE`] overlays are visible;
//! - colors come from [`PALETTE`] indexed by a counter that only grows until
//!   [`OverlaySet::clear`], so removing and re-adding never hands out the
//!   color of an overlay that is still on screen.

use serde::{Deserialize, Serialize};

use crate::directory::CurrencyResolver;
use crate::domain::{is_valid_currency_code, Country, CurrencyCode, TimeSeriesPoint};
use crate::entitlement::MAX_OVERLAYS_VISIBLE;
use crate::store::{StatePatch, StateStore};

/// Overlay colors, cycled in order.
pub const PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
];

/// A secondary series on the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub currency: CurrencyCode,
    pub country: Option<String>,
    pub color: String,
    pub visible: bool,
    /// Fetched series; `None` until the rate source answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<TimeSeriesPoint>>,
    pub is_from_destinations: bool,
}

/// Overlay lifecycle on top of the shared store.
#[derive(Debug)]
pub struct OverlaySet {
    store: StateStore,
    color_index: usize,
}

impl OverlaySet {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            color_index: 0,
        }
    }

    /// Current overlays, in insertion order.
    pub fn list(&self) -> Vec<Overlay> {
        self.store.active_overlays()
    }

    pub fn get(&self, currency: &str) -> Option<Overlay> {
        let currency = normalize(currency);
        self.list().into_iter().find(|o| o.currency == currency)
    }

    pub fn contains(&self, currency: &str) -> bool {
        self.get(currency).is_some()
    }

    pub fn visible(&self) -> Vec<Overlay> {
        self.list().into_iter().filter(|o| o.visible).collect()
    }

    pub fn visible_count(&self) -> usize {
        self.list().iter().filter(|o| o.visible).count()
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Add a visible overlay for `currency`.
    ///
    /// Returns `false` without changing anything when the code is malformed,
    /// already present, or the visible cap is reached.
    pub fn add(&mut self, currency: &str, country: Option<&str>, from_destinations: bool) -> bool {
        if !is_valid_currency_code(currency) {
            tracing::warn!(currency, "overlay rejected: malformed currency code");
            return false;
        }
        let currency = normalize(currency);

        let mut overlays = self.list();
        if overlays.iter().any(|o| o.currency == currency) {
            tracing::debug!(%currency, "overlay rejected: already present");
            return false;
        }
        if overlays.iter().filter(|o| o.visible).count() >= MAX_OVERLAYS_VISIBLE {
            tracing::debug!(%currency, "overlay rejected: visible cap reached");
            return false;
        }

        let color = PALETTE[self.color_index % PALETTE.len()].to_string();
        self.color_index += 1;

        tracing::debug!(%currency, %color, "overlay added");
        overlays.push(Overlay {
            currency,
            country: country.map(str::to_string),
            color,
            visible: true,
            data: None,
            is_from_destinations: from_destinations,
        });
        self.store.set(StatePatch::new().active_overlays(overlays));
        true
    }

    /// Remove regardless of visibility. Returns whether anything was removed.
    pub fn remove(&mut self, currency: &str) -> bool {
        let currency = normalize(currency);
        let overlays = self.list();
        let before = overlays.len();
        let kept: Vec<Overlay> = overlays
            .into_iter()
            .filter(|o| o.currency != currency)
            .collect();
        if kept.len() == before {
            return false;
        }
        tracing::debug!(%currency, "overlay removed");
        self.store.set(StatePatch::new().active_overlays(kept));
        true
    }

    /// Flip visibility. Fails when the overlay is unknown or showing it would
    /// exceed the visible cap.
    pub fn toggle(&mut self, currency: &str) -> bool {
        let currency = normalize(currency);
        let mut overlays = self.list();
        let visible = overlays.iter().filter(|o| o.visible).count();

        let Some(overlay) = overlays.iter_mut().find(|o| o.currency == currency) else {
            return false;
        };
        if !overlay.visible && visible >= MAX_OVERLAYS_VISIBLE {
            tracing::debug!(%currency, "overlay toggle rejected: visible cap reached");
            return false;
        }
        overlay.visible = !overlay.visible;

        self.store.set(StatePatch::new().active_overlays(overlays));
        true
    }

    /// Drop every overlay and restart the color cycle.
    pub fn clear(&mut self) {
        self.color_index = 0;
        self.store.set(StatePatch::new().active_overlays(Vec::new()));
    }

    /// Attach a fetched series. Late data for a removed overlay is dropped.
    pub fn update_data(&mut self, currency: &str, series: Vec<TimeSeriesPoint>) -> bool {
        let currency = normalize(currency);
        let mut overlays = self.list();
        let Some(overlay) = overlays.iter_mut().find(|o| o.currency == currency) else {
            tracing::debug!(%currency, "discarding data for removed overlay");
            return false;
        };
        overlay.data = Some(series);
        self.store.set(StatePatch::new().active_overlays(overlays));
        true
    }

    /// Follow a change of home currency: drop the overlay for the new home
    /// currency and forget every series fetched against the old one.
    /// Colors and visibility are kept.
    pub fn rebase(&mut self, home_currency: Option<&str>) {
        let home = home_currency.map(normalize);
        let current = self.list();
        let overlays: Vec<Overlay> = current
            .iter()
            .filter(|o| home.as_deref() != Some(o.currency.as_str()))
            .map(|o| Overlay {
                data: None,
                ..o.clone()
            })
            .collect();
        if overlays == current {
            return;
        }
        tracing::debug!(home = ?home, remaining = overlays.len(), "overlays rebased");
        self.store.set(StatePatch::new().active_overlays(overlays));
    }

    /// Rebuild overlays from the destination list.
    ///
    /// Skips the primary destination (already the main series) and any
    /// destination that shares the home currency. Adds at most
    /// [`MAX_OVERLAYS_VISIBLE`]. Returns the number added.
    pub fn populate_from_destinations(
        &mut self,
        destinations: &[Country],
        home: Option<&Country>,
        primary: Option<&Country>,
        resolver: &dyn CurrencyResolver,
    ) -> usize {
        self.clear();

        let home_currency = home.and_then(|c| resolver.currency_for(&c.name));
        let mut added = 0;

        for destination in destinations {
            if added >= MAX_OVERLAYS_VISIBLE {
                break;
            }
            if primary.is_some_and(|p| p.name == destination.name) {
                continue;
            }
            let Some(currency) = resolver.currency_for(&destination.name) else {
                continue;
            };
            if home_currency.as_deref() == Some(currency.as_str()) {
                continue;
            }
            if self.add(&currency, Some(&destination.name), true) {
                added += 1;
            }
        }

        tracing::debug!(added, "overlays populated from destinations");
        added
    }
}

fn normalize(currency: &str) -> String {
    currency.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::CurrencyDirectory;
    use chrono::NaiveDate;

    fn set() -> OverlaySet {
        OverlaySet::new(StateStore::new())
    }

    fn point(rate: f64) -> TimeSeriesPoint {
        TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), rate)
    }

    #[test]
    fn add_assigns_palette_in_order() {
        let mut overlays = set();
        assert!(overlays.add("GBP", Some("United Kingdom"), false));
        assert!(overlays.add("jpy", None, false));

        let list = overlays.list();
        assert_eq!(list[0].color, PALETTE[0]);
        assert_eq!(list[1].color, PALETTE[1]);
        assert_eq!(list[1].currency, "JPY");
        assert!(list.iter().all(|o| o.visible && o.data.is_none()));
    }

    #[test]
    fn duplicate_rejected() {
        let mut overlays = set();
        assert!(overlays.add("GBP", None, false));
        assert!(!overlays.add("GBP", None, false));
        assert!(!overlays.add("gbp", None, false));
        assert_eq!(overlays.len(), 1);
    }

    #[test]
    fn malformed_code_rejected() {
        let mut overlays = set();
        assert!(!overlays.add("POUND", None, false));
        assert!(!overlays.add("", None, false));
        assert!(overlays.is_empty());
    }

    #[test]
    fn visible_cap() {
        let mut overlays = set();
        assert!(overlays.add("GBP", None, false));
        assert!(overlays.add("JPY", None, false));
        assert!(overlays.add("CHF", None, false));
        assert!(!overlays.add("SEK", None, false));
        assert_eq!(overlays.visible_count(), 3);

        // Hiding one frees a slot
        assert!(overlays.toggle("GBP"));
        assert!(overlays.add("SEK", None, false));
        assert_eq!(overlays.len(), 4);

        // Showing GBP again would make four
        assert!(!overlays.toggle("GBP"));
        assert!(!overlays.get("GBP").unwrap().visible);
    }

    #[test]
    fn colors_not_reused_after_remove() {
        let mut overlays = set();
        overlays.add("GBP", None, false);
        overlays.add("JPY", None, false);
        assert!(overlays.remove("GBP"));
        overlays.add("CHF", None, false);
        let chf = overlays.get("CHF").unwrap();
        assert_eq!(chf.color, PALETTE[2]);
    }

    #[test]
    fn clear_resets_color_cycle() {
        let mut overlays = set();
        overlays.add("GBP", None, false);
        overlays.add("JPY", None, false);
        overlays.clear();
        assert!(overlays.is_empty());
        overlays.add("CHF", None, false);
        assert_eq!(overlays.get("CHF").unwrap().color, PALETTE[0]);
    }

    #[test]
    fn remove_unknown_is_false() {
        let mut overlays = set();
        assert!(!overlays.remove("GBP"));
        assert!(!overlays.toggle("GBP"));
    }

    #[test]
    fn late_data_does_not_resurrect() {
        let mut overlays = set();
        overlays.add("GBP", None, false);
        assert!(overlays.update_data("GBP", vec![point(0.85)]));
        assert_eq!(overlays.get("GBP").unwrap().data.unwrap().len(), 1);

        overlays.remove("GBP");
        assert!(!overlays.update_data("GBP", vec![point(0.86)]));
        assert!(overlays.is_empty());
    }

    #[test]
    fn list_is_published_to_store() {
        let store = StateStore::new();
        let mut overlays = OverlaySet::new(store.clone());
        overlays.add("GBP", None, false);
        assert_eq!(store.active_overlays().len(), 1);
    }

    #[test]
    fn populate_skips_primary_and_home_currency() {
        let dir = CurrencyDirectory::default_world();
        let mut overlays = set();
        overlays.add("SEK", None, false);

        let home = Country::new("France");
        let destinations = vec![
            Country::new("Japan"),
            Country::new("Germany"),
            Country::new("United Kingdom"),
            Country::new("Switzerland"),
        ];

        let added = overlays.populate_from_destinations(
            &destinations,
            Some(&home),
            destinations.first(),
            &dir,
        );

        // Japan is primary, Germany shares EUR with France
        assert_eq!(added, 2);
        let list = overlays.list();
        let codes: Vec<&str> = list.iter().map(|o| o.currency.as_str()).collect();
        assert_eq!(codes, vec!["GBP", "CHF"]);
        assert!(list.iter().all(|o| o.is_from_destinations));
        assert_eq!(list[0].country.as_deref(), Some("United Kingdom"));
        // Cleared first, so the color cycle restarted
        assert_eq!(list[0].color, PALETTE[0]);
    }

    #[test]
    fn populate_caps_at_visible_limit() {
        let dir = CurrencyDirectory::default_world();
        let mut overlays = set();
        let destinations: Vec<Country> = ["Japan", "Sweden", "Norway", "Poland", "Canada"]
            .into_iter()
            .map(Country::new)
            .collect();

        let added = overlays.populate_from_destinations(
            &destinations,
            Some(&Country::new("United States of America")),
            None,
            &dir,
        );
        assert_eq!(added, MAX_OVERLAYS_VISIBLE);
        assert_eq!(overlays.len(), MAX_OVERLAYS_VISIBLE);
    }

    #[test]
    fn rebase_drops_self_and_stale_data() {
        let mut overlays = set();
        overlays.add("GBP", None, false);
        overlays.add("SEK", None, false);
        overlays.toggle("SEK");
        overlays.update_data("GBP", vec![point(0.85)]);
        overlays.update_data("SEK", vec![point(11.4)]);

        overlays.rebase(Some("sek"));
        let list = overlays.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].currency, "GBP");
        assert_eq!(list[0].color, PALETTE[0]);
        assert!(list[0].visible);
        assert!(list[0].data.is_none());

        // The color cycle keeps counting
        overlays.add("NOK", None, false);
        assert_eq!(overlays.get("NOK").unwrap().color, PALETTE[2]);
    }
}
