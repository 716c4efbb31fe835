//! Observable application state. Single owner, main thread only.
//!
//! [`StateStore`] is a cheap handle (`Rc`) that components receive at
//! construction. All selection, overlay and indicator state lives in one
//! [`ApplicationState`] behind it. Reads return copies; writes go through
//! [`StateStore::set`] with a [`StatePatch`].
//!
//! Notification is synchronous. For every key present in a patch, the
//! listeners subscribed to that key run with `(new, old)`; then every
//! wildcard listener runs with `(new_state, old_state)`. Order is
//! subscription order.
//!
//! The listener list is snapshotted when a notification cycle starts. A
//! listener that unsubscribes itself or another listener mid-cycle does not
//! disturb the cycle in progress; a listener removed mid-cycle may still run
//! once in that cycle. A listener may call `set` again: the nested cycle runs
//! to completion before the outer cycle resumes, so later listeners of the
//! outer cycle see `(new, old)` values that are already stale. Nothing here
//! guards against that.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Country, MapMode};
use crate::indicators::IndicatorSet;
use crate::overlays::Overlay;

/// Everything the core owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub home_country: Option<Country>,
    /// Always the first entry of `destination_countries`, or `None` when empty.
    pub destination_country: Option<Country>,
    pub destination_countries: Vec<Country>,
    pub active_overlays: Vec<Overlay>,
    pub active_indicators: IndicatorSet,
    pub is_premium_user: bool,
    pub map_mode: MapMode,
}

impl ApplicationState {
    /// Copy of one field.
    pub fn value(&self, key: StateKey) -> StateValue {
        match key {
            StateKey::HomeCountry => StateValue::Country(self.home_country.clone()),
            StateKey::DestinationCountry => StateValue::Country(self.destination_country.clone()),
            StateKey::DestinationCountries => {
                StateValue::Countries(self.destination_countries.clone())
            }
            StateKey::ActiveOverlays => StateValue::Overlays(self.active_overlays.clone()),
            StateKey::ActiveIndicators => StateValue::Indicators(self.active_indicators.clone()),
            StateKey::IsPremiumUser => StateValue::Flag(self.is_premium_user),
            StateKey::MapMode => StateValue::MapMode(self.map_mode),
        }
    }
}

/// Addressable fields of [`ApplicationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    HomeCountry,
    DestinationCountry,
    DestinationCountries,
    ActiveOverlays,
    ActiveIndicators,
    IsPremiumUser,
    MapMode,
}

impl StateKey {
    pub const ALL: [StateKey; 7] = [
        StateKey::HomeCountry,
        StateKey::DestinationCountry,
        StateKey::DestinationCountries,
        StateKey::ActiveOverlays,
        StateKey::ActiveIndicators,
        StateKey::IsPremiumUser,
        StateKey::MapMode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::HomeCountry => "homeCountry",
            StateKey::DestinationCountry => "destinationCountry",
            StateKey::DestinationCountries => "destinationCountries",
            StateKey::ActiveOverlays => "activeOverlays",
            StateKey::ActiveIndicators => "activeIndicators",
            StateKey::IsPremiumUser => "isPremiumUser",
            StateKey::MapMode => "mapMode",
        }
    }
}

impl FromStr for StateKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A copied field value, as handed to key listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Country(Option<Country>),
    Countries(Vec<Country>),
    Overlays(Vec<Overlay>),
    Indicators(IndicatorSet),
    Flag(bool),
    MapMode(MapMode),
}

/// A shallow partial update. Only fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub home_country: Option<Option<Country>>,
    pub destination_country: Option<Option<Country>>,
    pub destination_countries: Option<Vec<Country>>,
    pub active_overlays: Option<Vec<Overlay>>,
    pub active_indicators: Option<IndicatorSet>,
    pub is_premium_user: Option<bool>,
    pub map_mode: Option<MapMode>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn home_country(mut self, country: Option<Country>) -> Self {
        self.home_country = Some(country);
        self
    }

    pub fn destination_country(mut self, country: Option<Country>) -> Self {
        self.destination_country = Some(country);
        self
    }

    pub fn destination_countries(mut self, countries: Vec<Country>) -> Self {
        self.destination_countries = Some(countries);
        self
    }

    /// Write the destination list and keep the primary in step with it.
    pub fn destinations(self, countries: Vec<Country>) -> Self {
        let primary = countries.first().cloned();
        self.destination_country(primary)
            .destination_countries(countries)
    }

    pub fn active_overlays(mut self, overlays: Vec<Overlay>) -> Self {
        self.active_overlays = Some(overlays);
        self
    }

    pub fn active_indicators(mut self, indicators: IndicatorSet) -> Self {
        self.active_indicators = Some(indicators);
        self
    }

    pub fn is_premium_user(mut self, premium: bool) -> Self {
        self.is_premium_user = Some(premium);
        self
    }

    pub fn map_mode(mut self, mode: MapMode) -> Self {
        self.map_mode = Some(mode);
        self
    }

    /// Keys present in this patch, in field order.
    pub fn keys(&self) -> Vec<StateKey> {
        let mut keys = Vec::new();
        if self.home_country.is_some() {
            keys.push(StateKey::HomeCountry);
        }
        if self.destination_country.is_some() {
            keys.push(StateKey::DestinationCountry);
        }
        if self.destination_countries.is_some() {
            keys.push(StateKey::DestinationCountries);
        }
        if self.active_overlays.is_some() {
            keys.push(StateKey::ActiveOverlays);
        }
        if self.active_indicators.is_some() {
            keys.push(StateKey::ActiveIndicators);
        }
        if self.is_premium_user.is_some() {
            keys.push(StateKey::IsPremiumUser);
        }
        if self.map_mode.is_some() {
            keys.push(StateKey::MapMode);
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    fn apply(self, state: &mut ApplicationState) {
        if let Some(v) = self.home_country {
            state.home_country = v;
        }
        if let Some(v) = self.destination_country {
            state.destination_country = v;
        }
        if let Some(v) = self.destination_countries {
            state.destination_countries = v;
        }
        if let Some(v) = self.active_overlays {
            state.active_overlays = v;
        }
        if let Some(v) = self.active_indicators {
            state.active_indicators = v;
        }
        if let Some(v) = self.is_premium_user {
            state.is_premium_user = v;
        }
        if let Some(v) = self.map_mode {
            state.map_mode = v;
        }
    }
}

type KeyListener = Rc<dyn Fn(&StateValue, &StateValue)>;
type AnyListener = Rc<dyn Fn(&ApplicationState, &ApplicationState)>;

#[derive(Clone)]
enum Listener {
    Key(StateKey, KeyListener),
    Any(AnyListener),
}

struct Inner {
    state: RefCell<ApplicationState>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
}

/// Shared handle to the application state.
#[derive(Clone)]
pub struct StateStore {
    inner: Rc<Inner>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_state(ApplicationState::default())
    }

    pub fn with_state(state: ApplicationState) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(state),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Full snapshot (a copy, never the live state).
    pub fn get(&self) -> ApplicationState {
        self.inner.state.borrow().clone()
    }

    /// Copy of one field.
    pub fn get_key(&self, key: StateKey) -> StateValue {
        self.inner.state.borrow().value(key)
    }

    /// Copy of a field addressed by its name; `None` for unknown names.
    pub fn get_named(&self, name: &str) -> Option<StateValue> {
        name.parse::<StateKey>().ok().map(|key| self.get_key(key))
    }

    pub fn home_country(&self) -> Option<Country> {
        self.inner.state.borrow().home_country.clone()
    }

    pub fn destination_country(&self) -> Option<Country> {
        self.inner.state.borrow().destination_country.clone()
    }

    pub fn destination_countries(&self) -> Vec<Country> {
        self.inner.state.borrow().destination_countries.clone()
    }

    pub fn active_overlays(&self) -> Vec<Overlay> {
        self.inner.state.borrow().active_overlays.clone()
    }

    pub fn active_indicators(&self) -> IndicatorSet {
        self.inner.state.borrow().active_indicators.clone()
    }

    pub fn is_premium_user(&self) -> bool {
        self.inner.state.borrow().is_premium_user
    }

    pub fn map_mode(&self) -> MapMode {
        self.inner.state.borrow().map_mode
    }

    /// Merge `patch` and notify. An empty patch is a no-op.
    pub fn set(&self, patch: StatePatch) {
        if patch.is_empty() {
            return;
        }
        let keys = patch.keys();

        // The state borrow ends here so listeners may read or write freely.
        let (old, new) = {
            let mut state = self.inner.state.borrow_mut();
            let old = state.clone();
            patch.apply(&mut state);
            (old, state.clone())
        };

        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for key in &keys {
            let new_value = new.value(*key);
            let old_value = old.value(*key);
            for listener in &listeners {
                if let Listener::Key(k, callback) = listener {
                    if k == key {
                        callback(&new_value, &old_value);
                    }
                }
            }
        }

        for listener in &listeners {
            if let Listener::Any(callback) = listener {
                callback(&new, &old);
            }
        }
    }

    /// Subscribe to changes of one key.
    pub fn subscribe<F>(&self, key: StateKey, callback: F) -> Subscription
    where
        F: Fn(&StateValue, &StateValue) + 'static,
    {
        self.register(Listener::Key(key, Rc::new(callback)))
    }

    /// Subscribe to every `set`, regardless of which keys changed.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ApplicationState, &ApplicationState) + 'static,
    {
        self.register(Listener::Any(Rc::new(callback)))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn register(&self, listener: Listener) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, listener));
        Subscription {
            store: Rc::downgrade(&self.inner),
            id,
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &*self.inner.state.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle returned by [`StateStore::subscribe`]. Dropping it keeps the
/// listener registered; call [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    store: Weak<Inner>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Idempotent; safe to call from inside a callback.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.store.upgrade() {
            inner.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}
