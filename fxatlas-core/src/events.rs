//! Selection events and the sink trait for emitting them.
//!
//! The core never calls into the map, the chart or a fetch layer directly.
//! It emits [`SelectionEvent`]s after each mutation has been written to the
//! store, and the embedding application translates them (redraw highlights,
//! lock the map, start a fetch, hide the rate display).

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::domain::Country;

/// Home/primary-destination names a refresh was issued for.
///
/// Results tagged with a snapshot that no longer matches the live selection
/// are stale and must be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub home: Option<String>,
    pub destination: Option<String>,
}

/// A request for the main pair's series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// Monotonic per selection machine.
    pub id: u64,
    pub snapshot: SelectionSnapshot,
    pub base_currency: String,
    pub quote_currency: String,
    pub range_days: u32,
}

/// Something the presentation or fetch layer should react to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionEvent {
    /// Redraw map highlights.
    SelectionChanged {
        home: Option<Country>,
        destinations: Vec<Country>,
    },
    MapLocked,
    MapUnlocked,
    /// Fetch the series for the current pair.
    RefreshRequested(RefreshRequest),
    /// Fetch the series for one overlay currency against the home currency.
    OverlayFetchRequested {
        base_currency: String,
        quote_currency: String,
        range_days: u32,
    },
    /// Selection was cleared; hide any rate display.
    RateDisplayHidden,
    /// A country without a known currency was picked; nothing changed.
    UnresolvableCountry { name: String },
}

/// Trait for receiving selection events.
///
/// `emit` runs synchronously inside the mutating call and must not block.
pub trait SelectionEventSink {
    fn emit(&self, event: SelectionEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl SelectionEventSink for NoOpSink {
    fn emit(&self, _event: SelectionEvent) {}
}

/// Collects events in order; cloning shares the buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<SelectionEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SelectionEvent> {
        self.events.borrow().clone()
    }

    /// Remove and return everything collected so far.
    pub fn drain(&self) -> Vec<SelectionEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn refresh_requests(&self) -> Vec<RefreshRequest> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SelectionEvent::RefreshRequested(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl SelectionEventSink for RecordingSink {
    fn emit(&self, event: SelectionEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl<S: SelectionEventSink + ?Sized> SelectionEventSink for Rc<S> {
    fn emit(&self, event: SelectionEvent) {
        (**self).emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_does_not_panic() {
        NoOpSink.emit(SelectionEvent::MapLocked);
    }

    #[test]
    fn recording_sink_collects_in_order() {
        let sink = RecordingSink::new();
        let shared = sink.clone();
        shared.emit(SelectionEvent::MapLocked);
        shared.emit(SelectionEvent::MapUnlocked);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events()[0], SelectionEvent::MapLocked);

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_string(&SelectionEvent::UnresolvableCountry {
            name: "Atlantis".into(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"unresolvable_country\""));
    }
}
