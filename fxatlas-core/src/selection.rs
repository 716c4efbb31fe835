//! Country selection state machine.
//!
//! Two orthogonal pieces of state, both kept in the [`StateStore`]:
//!
//! - the free two-click flow: `Empty → HomeSelected → BothSelected`, where a
//!   third click clears everything and starts over with the clicked country
//!   as the new home;
//! - the map mode: `Interactive`, `Adding` (next click adds a destination)
//!   and `Locked` (clicks ignored).
//!
//! Every mutating operation writes the store first, then emits
//! [`SelectionEvent`]s for the map, and only then emits a
//! [`SelectionEvent::RefreshRequested`]. Operations never fail: a rejected
//! mutation returns `false` and leaves the state unchanged.

use std::rc::Rc;

use crate::directory::CurrencyResolver;
use crate::domain::{Country, MapMode};
use crate::entitlement::{EntitlementSource, Tier};
use crate::events::{RefreshRequest, SelectionEvent, SelectionEventSink, SelectionSnapshot};
use crate::overlays::OverlaySet;
use crate::store::{StatePatch, StateStore};

/// Default history window requested with each refresh.
pub const DEFAULT_RANGE_DAYS: u32 = 365;

/// Which leg an explicit assignment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Home,
    Destination,
}

/// Where the two-click flow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Empty,
    HomeSelected,
    BothSelected,
}

pub struct SelectionMachine {
    store: StateStore,
    overlays: OverlaySet,
    resolver: Rc<dyn CurrencyResolver>,
    sink: Rc<dyn SelectionEventSink>,
    range_days: u32,
    next_request_id: u64,
}

impl SelectionMachine {
    pub fn new(
        store: StateStore,
        resolver: Rc<dyn CurrencyResolver>,
        sink: Rc<dyn SelectionEventSink>,
    ) -> Self {
        Self {
            overlays: OverlaySet::new(store.clone()),
            store,
            resolver,
            sink,
            range_days: DEFAULT_RANGE_DAYS,
            next_request_id: 0,
        }
    }

    pub fn with_range_days(mut self, range_days: u32) -> Self {
        self.range_days = range_days;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn overlays(&self) -> &OverlaySet {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut OverlaySet {
        &mut self.overlays
    }

    pub fn resolver(&self) -> &dyn CurrencyResolver {
        self.resolver.as_ref()
    }

    pub fn range_days(&self) -> u32 {
        self.range_days
    }

    pub fn tier(&self) -> Tier {
        Tier::from_premium(self.store.is_premium_user())
    }

    /// Maximum destinations for the current tier.
    pub fn destination_cap(&self) -> usize {
        self.tier().destination_cap()
    }

    /// Copy the premium flag from the entitlement source into the store.
    ///
    /// A downgrade keeps existing destinations; adds are rejected until the
    /// list is back under the cap.
    pub fn sync_entitlement(&self, source: &dyn EntitlementSource) {
        let premium = source.is_premium();
        if premium != self.store.is_premium_user() {
            tracing::info!(premium, "entitlement changed");
            self.store.set(StatePatch::new().is_premium_user(premium));
        }
    }

    pub fn phase(&self) -> SelectionPhase {
        let state = self.store.get();
        match (&state.home_country, &state.destination_country) {
            (None, _) => SelectionPhase::Empty,
            (Some(_), None) => SelectionPhase::HomeSelected,
            (Some(_), Some(_)) => SelectionPhase::BothSelected,
        }
    }

    /// The pair a refresh issued now would be tagged with.
    pub fn snapshot(&self) -> SelectionSnapshot {
        let state = self.store.get();
        SelectionSnapshot {
            home: state.home_country.map(|c| c.name),
            destination: state.destination_country.map(|c| c.name),
        }
    }

    /// Map click.
    pub fn select_by_click(&mut self, name: &str, geometry: Option<String>) -> bool {
        match self.store.map_mode() {
            MapMode::Locked => {
                tracing::debug!(country = name, "click ignored: map locked");
                false
            }
            MapMode::Adding => self.add_from_click(Country::with_geometry(name, geometry)),
            MapMode::Interactive => self.two_click(Country::with_geometry(name, geometry)),
        }
    }

    fn add_from_click(&mut self, country: Country) -> bool {
        if !self.resolvable(&country.name) {
            return false;
        }
        if self.add_country(country) {
            return true;
        }
        // Rejected (cap or duplicate): leave adding mode anyway.
        let mode = if self.store.destination_countries().is_empty() {
            MapMode::Interactive
        } else {
            MapMode::Locked
        };
        self.commit(StatePatch::new().map_mode(mode));
        false
    }

    fn two_click(&mut self, country: Country) -> bool {
        if !self.resolvable(&country.name) {
            return false;
        }
        let state = self.store.get();

        match (&state.home_country, &state.destination_country) {
            (None, destination) => {
                if destination.as_ref().is_some_and(|d| d.is(&country.name)) {
                    return false;
                }
                tracing::debug!(country = %country.name, "home selected");
                self.commit(StatePatch::new().home_country(Some(country)));
                self.rebase_overlays(None);
                self.request_refresh();
                true
            }
            (Some(home), None) => {
                if home.is(&country.name) {
                    return false;
                }
                tracing::debug!(country = %country.name, "destination selected");
                self.commit(StatePatch::new().destinations(vec![country]));
                self.request_refresh();
                true
            }
            (Some(_), Some(_)) => {
                tracing::debug!(country = %country.name, "third click: starting over");
                self.clear_all();
                self.commit(StatePatch::new().home_country(Some(country)));
                true
            }
        }
    }

    /// Explicit assignment, bypassing click sequencing.
    pub fn select_by_name(
        &mut self,
        name: &str,
        kind: SelectionKind,
        geometry: Option<String>,
    ) -> bool {
        if !self.resolvable(name) {
            return false;
        }
        let country = Country::with_geometry(name, geometry);

        match kind {
            SelectionKind::Home => {
                if self.store.home_country().is_some_and(|h| h.is(name)) {
                    return false;
                }
                if self.store.destination_countries().iter().any(|d| d.is(name)) {
                    tracing::debug!(country = name, "home rejected: already a destination");
                    return false;
                }
                let old_currency = self.home_currency();
                self.commit(StatePatch::new().home_country(Some(country)));
                self.rebase_overlays(old_currency);
            }
            SelectionKind::Destination => {
                if self.store.home_country().is_some_and(|h| h.is(name)) {
                    return false;
                }
                let current = self.store.destination_countries();
                let appending = current.len() > 1;
                let next = match current.len() {
                    0 => vec![country],
                    1 if current[0].is(name) => return false,
                    1 => vec![country],
                    _ if current.iter().any(|c| c.is(name)) => return false,
                    n if n >= self.destination_cap() => {
                        tracing::warn!(country = name, cap = self.destination_cap(), "destination rejected: cap reached");
                        return false;
                    }
                    _ => {
                        let mut next = current.clone();
                        next.push(country);
                        next
                    }
                };
                self.commit(StatePatch::new().destinations(next));
                if appending {
                    self.populate_overlays();
                }
            }
        }

        self.request_refresh();
        true
    }

    /// Append a destination and lock the map.
    pub fn add_destination(&mut self, name: &str) -> bool {
        if !self.resolvable(name) {
            return false;
        }
        self.add_country(Country::new(name))
    }

    fn add_country(&mut self, country: Country) -> bool {
        let current = self.store.destination_countries();
        if current.iter().any(|c| c.is(&country.name)) {
            tracing::debug!(country = %country.name, "destination already present");
            return false;
        }
        let cap = self.destination_cap();
        if current.len() >= cap {
            tracing::warn!(country = %country.name, cap, "destination rejected: cap reached");
            return false;
        }

        let had_destinations = !current.is_empty();
        let mut next = current;
        next.push(country);
        tracing::debug!(count = next.len(), "destination added");

        self.commit(
            StatePatch::new()
                .destinations(next)
                .map_mode(MapMode::Locked),
        );
        if had_destinations {
            self.populate_overlays();
        }
        self.request_refresh();
        true
    }

    /// Remove a destination by name. The next entry becomes primary; an empty
    /// list unlocks the map.
    pub fn remove_destination(&mut self, name: &str) -> bool {
        let current = self.store.destination_countries();
        if !current.iter().any(|c| c.is(name)) {
            return false;
        }
        let was_primary = current.first().is_some_and(|c| c.is(name));
        let next: Vec<Country> = current.into_iter().filter(|c| !c.is(name)).collect();

        let mut patch = StatePatch::new().destinations(next.clone());
        if next.is_empty() {
            patch = patch.map_mode(MapMode::Interactive);
        }
        tracing::debug!(country = name, was_primary, "destination removed");
        self.commit(patch);

        if self.has_destination_overlays() {
            self.populate_overlays();
        }
        if was_primary {
            self.request_refresh();
        }
        true
    }

    /// Exchange home and primary destination in place.
    pub fn swap(&mut self) -> bool {
        let state = self.store.get();
        let (Some(home), Some(primary)) = (state.home_country, state.destination_country) else {
            return false;
        };

        let mut next: Vec<Country> = Vec::with_capacity(state.destination_countries.len());
        for c in state.destination_countries {
            let c = if c.is(&primary.name) { home.clone() } else { c };
            // Old home may already sit further down the list
            if !next.iter().any(|n: &Country| n.is(&c.name)) {
                next.push(c);
            }
        }

        tracing::debug!(home = %primary.name, destination = %home.name, "swapped");
        let old_currency = self.home_currency();
        self.commit(
            StatePatch::new()
                .home_country(Some(primary))
                .destinations(next),
        );
        self.rebase_overlays(old_currency);
        self.request_refresh();
        true
    }

    /// Reset selection, unlock the map, drop overlays, hide the rate display.
    pub fn clear_all(&mut self) {
        tracing::debug!("selection cleared");
        self.commit(
            StatePatch::new()
                .home_country(None)
                .destinations(Vec::new())
                .map_mode(MapMode::Interactive),
        );
        self.overlays.clear();
        self.sink.emit(SelectionEvent::RateDisplayHidden);
    }

    /// Next click adds a destination. Rejected while locked.
    pub fn enter_adding_mode(&mut self) -> bool {
        if self.store.map_mode() != MapMode::Interactive {
            return false;
        }
        self.commit(StatePatch::new().map_mode(MapMode::Adding));
        true
    }

    pub fn exit_adding_mode(&mut self) -> bool {
        if self.store.map_mode() != MapMode::Adding {
            return false;
        }
        self.commit(StatePatch::new().map_mode(MapMode::Interactive));
        true
    }

    /// Emit a refresh for the current pair, if both legs resolve.
    pub fn request_refresh(&mut self) -> Option<RefreshRequest> {
        let snapshot = self.snapshot();
        let (Some(home), Some(destination)) = (&snapshot.home, &snapshot.destination) else {
            return None;
        };
        let base_currency = self.resolver.currency_for(home)?;
        let quote_currency = self.resolver.currency_for(destination)?;

        self.next_request_id += 1;
        let request = RefreshRequest {
            id: self.next_request_id,
            snapshot,
            base_currency,
            quote_currency,
            range_days: self.range_days,
        };
        tracing::info!(
            id = request.id,
            base = %request.base_currency,
            quote = %request.quote_currency,
            "refresh requested"
        );
        self.sink.emit(SelectionEvent::RefreshRequested(request.clone()));
        Some(request)
    }

    fn resolvable(&self, name: &str) -> bool {
        if self.resolver.currency_for(name).is_some() {
            return true;
        }
        tracing::warn!(country = name, "no currency for country");
        self.sink.emit(SelectionEvent::UnresolvableCountry {
            name: name.to_string(),
        });
        false
    }

    fn home_currency(&self) -> Option<String> {
        self.store
            .home_country()
            .and_then(|h| self.resolver.currency_for(&h.name))
    }

    fn has_destination_overlays(&self) -> bool {
        self.overlays.list().iter().any(|o| o.is_from_destinations)
    }

    /// Rebuild overlays from the destination list and ask for their series.
    fn populate_overlays(&mut self) {
        let state = self.store.get();
        self.overlays.populate_from_destinations(
            &state.destination_countries,
            state.home_country.as_ref(),
            state.destination_country.as_ref(),
            self.resolver.as_ref(),
        );

        self.request_overlay_fetches();
    }

    /// Keep overlays consistent with a new home country. Destination-derived
    /// overlays are rebuilt; otherwise the set is rebased when the home
    /// currency moved.
    fn rebase_overlays(&mut self, old_currency: Option<String>) {
        if self.has_destination_overlays() {
            self.populate_overlays();
            return;
        }
        let currency = self.home_currency();
        if currency == old_currency {
            return;
        }
        self.overlays.rebase(currency.as_deref());
        self.request_overlay_fetches();
    }

    /// Ask for the series of every visible overlay that has none.
    fn request_overlay_fetches(&self) {
        let Some(base_currency) = self.home_currency() else {
            return;
        };
        for overlay in self.overlays.visible().into_iter().filter(|o| o.data.is_none()) {
            self.sink.emit(SelectionEvent::OverlayFetchRequested {
                base_currency: base_currency.clone(),
                quote_currency: overlay.currency,
                range_days: self.range_days,
            });
        }
    }

    /// Write through the store, then tell the map what changed.
    fn commit(&mut self, patch: StatePatch) {
        let touches_selection = patch.home_country.is_some() || patch.destination_countries.is_some();
        let old_mode = self.store.map_mode();

        self.store.set(patch);

        let state = self.store.get();
        if touches_selection {
            self.sink.emit(SelectionEvent::SelectionChanged {
                home: state.home_country,
                destinations: state.destination_countries,
            });
        }
        if old_mode != state.map_mode {
            match (old_mode, state.map_mode) {
                (_, MapMode::Locked) => self.sink.emit(SelectionEvent::MapLocked),
                (MapMode::Locked, _) => self.sink.emit(SelectionEvent::MapUnlocked),
                _ => {}
            }
        }
    }
}
