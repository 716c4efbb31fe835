//! FX Atlas core: state store, country selection, overlays and indicators.
//!
//! This crate holds the interactive half of a currency-comparison map:
//! - An observable state store with per-key and wildcard subscriptions
//! - The home/destination selection machine with map modes and tier caps
//! - Overlay bookkeeping for secondary currency series
//! - Pure indicator functions (SMA, volatility bands, momentum oscillator)
//! - Rate sources, a background fetch worker and the chart session that
//!   applies their results

pub mod config;
pub mod directory;
pub mod domain;
pub mod entitlement;
pub mod events;
pub mod indicators;
pub mod overlays;
pub mod persistence;
pub mod rates;
pub mod selection;
pub mod session;
pub mod store;
pub mod worker;

pub use config::{AppConfig, ConfigError};
pub use directory::{CurrencyDirectory, CurrencyResolver};
pub use domain::{Country, CurrencyCode, MapMode, TimeSeriesPoint};
pub use entitlement::{EntitlementSource, StaticEntitlement, Tier, MAX_OVERLAYS_VISIBLE};
pub use events::{
    NoOpSink, RecordingSink, RefreshRequest, SelectionEvent, SelectionEventSink, SelectionSnapshot,
};
pub use overlays::{Overlay, OverlaySet, PALETTE};
pub use rates::{CsvRateSource, RateError, RateSource, StaticRateSource, SyntheticRateSource};
pub use selection::{SelectionKind, SelectionMachine, SelectionPhase};
pub use session::{ApplyOutcome, ChartDataset, ChartSeries, ChartSession};
pub use store::{ApplicationState, StateKey, StatePatch, StateStore, StateValue, Subscription};
pub use worker::{spawn_worker, FetchCommand, FetchResponse};
