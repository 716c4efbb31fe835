//! End-to-end selection flows through the public API.
//!
//! Each test drives a `SelectionMachine` the way a map front end would and
//! checks both the store contents and the events a renderer would see.

use std::cell::RefCell;
use std::rc::Rc;

use fxatlas_core::{
    Country, CurrencyDirectory, MapMode, RecordingSink, SelectionEvent, SelectionMachine,
    StateKey, StateStore, StateValue, StaticEntitlement, Tier,
};

fn machine() -> (SelectionMachine, RecordingSink) {
    let sink = RecordingSink::new();
    let machine = SelectionMachine::new(
        StateStore::new(),
        Rc::new(CurrencyDirectory::default_world()),
        Rc::new(sink.clone()),
    );
    (machine, sink)
}

fn names(countries: &[Country]) -> Vec<String> {
    countries.iter().map(|c| c.name.clone()).collect()
}

#[test]
fn free_flow_france_germany_italy() {
    let (mut m, sink) = machine();

    m.select_by_click("France", None);
    m.select_by_click("Germany", None);
    let state = m.store().get();
    assert_eq!(state.home_country.unwrap().name, "France");
    assert_eq!(names(&state.destination_countries), vec!["Germany"]);
    assert_eq!(state.map_mode, MapMode::Interactive);

    // Both legs are EUR; the refresh still goes out
    let requests = sink.refresh_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].base_currency, "EUR");
    assert_eq!(requests[0].quote_currency, "EUR");

    m.select_by_click("Italy", None);
    let state = m.store().get();
    assert_eq!(state.home_country.unwrap().name, "Italy");
    assert!(state.destination_country.is_none());
    assert!(state.destination_countries.is_empty());
    assert!(sink.events().contains(&SelectionEvent::RateDisplayHidden));
}

#[test]
fn premium_user_adds_six_destinations() {
    let (mut m, _) = machine();
    m.sync_entitlement(&StaticEntitlement(Tier::Premium));
    m.select_by_click("United Kingdom", None);

    let candidates = ["Japan", "Sweden", "Norway", "Poland", "Canada", "Mexico"];
    let accepted: Vec<bool> = candidates.iter().map(|c| m.add_destination(c)).collect();
    assert_eq!(accepted, vec![true, true, true, true, true, false]);

    let state = m.store().get();
    assert_eq!(state.destination_countries.len(), 5);
    assert_eq!(state.destination_country.unwrap().name, "Japan");
    assert_eq!(state.map_mode, MapMode::Locked);

    // Overlays come from the non-primary destinations, capped at three visible
    let overlays = m.overlays().list();
    assert_eq!(overlays.len(), 3);
    assert!(overlays.iter().all(|o| o.is_from_destinations && o.visible));
    let currencies: Vec<&str> = overlays.iter().map(|o| o.currency.as_str()).collect();
    assert_eq!(currencies, vec!["SEK", "NOK", "PLN"]);
}

#[test]
fn swap_twice_restores_selection() {
    let (mut m, _) = machine();
    m.sync_entitlement(&StaticEntitlement(Tier::Premium));
    m.select_by_click("Switzerland", None);
    m.add_destination("Japan");
    m.add_destination("Canada");
    m.add_destination("Norway");
    let before = m.store().get();

    assert!(m.swap());
    assert_eq!(m.store().home_country().unwrap().name, "Japan");
    assert_eq!(m.store().destination_country().unwrap().name, "Switzerland");

    assert!(m.swap());
    let after = m.store().get();
    assert_eq!(after.home_country, before.home_country);
    assert_eq!(after.destination_countries, before.destination_countries);
}

#[test]
fn emptying_destinations_unlocks_for_adding() {
    let (mut m, _) = machine();
    m.select_by_click("France", None);
    m.add_destination("Japan");
    m.add_destination("Sweden");
    assert!(!m.enter_adding_mode());

    m.remove_destination("Sweden");
    assert_eq!(m.store().map_mode(), MapMode::Locked);
    m.remove_destination("Japan");
    assert_eq!(m.store().map_mode(), MapMode::Interactive);

    assert!(m.enter_adding_mode());
    assert!(m.select_by_click("Japan", None));
    assert_eq!(m.store().map_mode(), MapMode::Locked);
}

#[test]
fn rejected_click_in_adding_mode_leaves_adding() {
    let (mut m, _) = machine();
    m.select_by_click("France", None);
    m.select_by_click("Japan", None);
    assert!(m.enter_adding_mode());

    // Duplicate of the existing destination
    assert!(!m.select_by_click("Japan", None));
    assert_eq!(m.store().map_mode(), MapMode::Locked);
    assert_eq!(names(&m.store().destination_countries()), vec!["Japan"]);
}

#[test]
fn subscribers_see_selection_before_refresh() {
    let (mut m, sink) = machine();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let probe = sink.clone();

    let subscription = m.store().subscribe(StateKey::DestinationCountry, move |new, _| {
        if let StateValue::Country(Some(c)) = new {
            log.borrow_mut().push((c.name.clone(), probe.refresh_requests().len()));
        }
    });

    m.select_by_click("France", None);
    m.select_by_click("Japan", None);
    assert_eq!(*seen.borrow(), vec![("Japan".to_string(), 0)]);
    assert_eq!(sink.refresh_requests().len(), 1);

    subscription.unsubscribe();
    m.select_by_click("Spain", None);
    m.select_by_click("Mexico", None);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn event_order_for_add_destination() {
    let (mut m, sink) = machine();
    m.select_by_click("France", None);
    sink.clear();

    m.add_destination("Japan");
    let events = sink.events();
    assert!(matches!(events[0], SelectionEvent::SelectionChanged { .. }));
    assert_eq!(events[1], SelectionEvent::MapLocked);
    assert!(matches!(events.last(), Some(SelectionEvent::RefreshRequested(_))));
}

#[test]
fn removing_primary_refreshes_new_primary() {
    let (mut m, sink) = machine();
    m.sync_entitlement(&StaticEntitlement(Tier::Premium));
    m.select_by_click("France", None);
    m.add_destination("Japan");
    m.add_destination("Sweden");
    m.add_destination("Norway");
    sink.clear();

    // Non-primary entry: overlays shift, the main pair does not
    assert!(m.remove_destination("Norway"));
    assert!(sink.refresh_requests().is_empty());

    assert!(m.remove_destination("Japan"));
    let requests = sink.refresh_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].quote_currency, "SEK");
    assert_eq!(requests[0].snapshot.destination.as_deref(), Some("Sweden"));
}

#[test]
fn home_change_rebuilds_overlays() {
    let (mut m, sink) = machine();
    m.sync_entitlement(&StaticEntitlement(Tier::Premium));
    m.select_by_click("Switzerland", None);
    m.add_destination("Japan");
    m.add_destination("Sweden");
    m.add_destination("Norway");
    sink.clear();

    assert!(m.swap());
    let overlays = m.overlays().list();
    let currencies: Vec<&str> = overlays.iter().map(|o| o.currency.as_str()).collect();
    assert_eq!(currencies, vec!["SEK", "NOK"]);
    assert!(overlays.iter().all(|o| o.data.is_none()));

    let fetched: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SelectionEvent::OverlayFetchRequested {
                base_currency,
                quote_currency,
                ..
            } => Some(format!("{base_currency}/{quote_currency}")),
            _ => None,
        })
        .collect();
    assert_eq!(fetched, vec!["JPY/SEK", "JPY/NOK"]);
}
