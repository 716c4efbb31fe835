//! Chart session: ties selection, fetch results and indicators together.
//!
//! The session owns the store and the selection machine. Fetch results come
//! back through [`ChartSession::apply_series`] and
//! [`ChartSession::apply_overlay_series`]; anything answering a selection
//! that has since changed is dropped. [`ChartSession::build_dataset`] turns
//! the current state into the series handed to a chart renderer.

use std::collections::HashMap;
use std::rc::Rc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::directory::CurrencyResolver;
use crate::domain::{labels, rates, TimeSeriesPoint};
use crate::events::{RefreshRequest, SelectionEventSink, SelectionSnapshot};
use crate::indicators::{momentum_oscillator, sma, volatility_bands, Band, IndicatorKey};
use crate::rates::RateError;
use crate::selection::SelectionMachine;
use crate::store::{ApplicationState, StatePatch, StateStore};
use crate::worker::{FetchCommand, FetchResponse};

/// Line color of the main pair.
pub const MAIN_SERIES_COLOR: &str = "#36a2eb";

/// What happened to a completed fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    /// The selection moved on, or the overlay was removed.
    Stale,
    /// The source failed; nothing changed.
    Failed(RateError),
}

/// The main pair's series and the selection it was fetched for.
#[derive(Debug, Clone, PartialEq)]
pub struct MainSeries {
    pub request_id: u64,
    pub snapshot: SelectionSnapshot,
    pub base_currency: String,
    pub quote_currency: String,
    pub points: Vec<TimeSeriesPoint>,
}

impl MainSeries {
    pub fn pair(&self) -> String {
        format!("{}/{}", self.base_currency, self.quote_currency)
    }
}

/// One line on the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub color: String,
    pub values: Vec<Option<f64>>,
}

/// Everything a renderer needs: shared date labels plus aligned series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

impl ChartDataset {
    pub fn series(&self, name: &str) -> Option<&ChartSeries> {
        self.series.iter().find(|s| s.name == name)
    }
}

pub struct ChartSession {
    store: StateStore,
    selection: SelectionMachine,
    band_width: f64,
    max_period_fraction: f64,
    main: Option<MainSeries>,
}

impl ChartSession {
    pub fn new(
        config: &AppConfig,
        resolver: Rc<dyn CurrencyResolver>,
        sink: Rc<dyn SelectionEventSink>,
    ) -> Self {
        let store = StateStore::with_state(ApplicationState {
            active_indicators: config.indicators.indicator_set(),
            ..ApplicationState::default()
        });
        let selection = SelectionMachine::new(store.clone(), resolver, sink)
            .with_range_days(config.chart.range_days);
        Self {
            store,
            selection,
            band_width: config.indicators.bollinger_width,
            max_period_fraction: config.chart.max_period_fraction,
            main: None,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionMachine {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionMachine {
        &mut self.selection
    }

    /// Last applied main series, whatever the current selection.
    pub fn main_series(&self) -> Option<&MainSeries> {
        self.main.as_ref()
    }

    /// Apply a completed main-series fetch.
    ///
    /// Results for a snapshot other than the live one, or older than what is
    /// already shown, are discarded. Failures leave the held series alone.
    pub fn apply_series(
        &mut self,
        request: &RefreshRequest,
        result: Result<Vec<TimeSeriesPoint>, RateError>,
    ) -> ApplyOutcome {
        if request.snapshot != self.selection.snapshot() {
            tracing::debug!(id = request.id, "discarding stale series");
            return ApplyOutcome::Stale;
        }
        if self.main.as_ref().is_some_and(|m| m.request_id > request.id) {
            tracing::debug!(id = request.id, "discarding series older than the one shown");
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(points) => {
                tracing::info!(
                    id = request.id,
                    base = %request.base_currency,
                    quote = %request.quote_currency,
                    points = points.len(),
                    "series applied"
                );
                self.main = Some(MainSeries {
                    request_id: request.id,
                    snapshot: request.snapshot.clone(),
                    base_currency: request.base_currency.clone(),
                    quote_currency: request.quote_currency.clone(),
                    points,
                });
                ApplyOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(id = request.id, error = %e, "series fetch failed");
                ApplyOutcome::Failed(e)
            }
        }
    }

    /// Attach a completed overlay fetch. Data fetched against a home currency
    /// that is no longer selected, or for a removed overlay, is dropped.
    pub fn apply_overlay_series(
        &mut self,
        base_currency: &str,
        currency: &str,
        result: Result<Vec<TimeSeriesPoint>, RateError>,
    ) -> ApplyOutcome {
        if self.home_currency().as_deref() != Some(base_currency) {
            tracing::debug!(base_currency, currency, "discarding overlay for previous home");
            return ApplyOutcome::Stale;
        }
        match result {
            Ok(points) => {
                if self.selection.overlays_mut().update_data(currency, points) {
                    ApplyOutcome::Applied
                } else {
                    ApplyOutcome::Stale
                }
            }
            Err(e) => {
                tracing::warn!(currency, error = %e, "overlay fetch failed");
                ApplyOutcome::Failed(e)
            }
        }
    }

    /// Route a worker response to the matching `apply_*` call.
    pub fn handle_response(&mut self, response: FetchResponse) -> ApplyOutcome {
        match response {
            FetchResponse::MainSeries { request, result } => self.apply_series(&request, result),
            FetchResponse::Overlay {
                base_currency,
                currency,
                result,
            } => self.apply_overlay_series(&base_currency, &currency, result),
        }
    }

    /// Add a manual overlay. Its series still has to be fetched; see
    /// [`ChartSession::pending_overlay_fetches`].
    pub fn add_overlay(&mut self, currency: &str) -> bool {
        self.selection.overlays_mut().add(currency, None, false)
    }

    pub fn remove_overlay(&mut self, currency: &str) -> bool {
        self.selection.overlays_mut().remove(currency)
    }

    pub fn toggle_overlay(&mut self, currency: &str) -> bool {
        self.selection.overlays_mut().toggle(currency)
    }

    /// Fetches for visible overlays that have no data yet.
    pub fn pending_overlay_fetches(&self) -> Vec<FetchCommand> {
        let Some(base_currency) = self.home_currency() else {
            return Vec::new();
        };
        self.selection
            .overlays()
            .visible()
            .into_iter()
            .filter(|o| o.data.is_none())
            .map(|o| FetchCommand::Overlay {
                base_currency: base_currency.clone(),
                quote_currency: o.currency,
                range_days: self.selection.range_days(),
            })
            .collect()
    }

    /// Flip an indicator and return its new state.
    pub fn toggle_indicator(&mut self, key: impl Into<IndicatorKey>) -> bool {
        let mut indicators = self.store.active_indicators();
        let active = indicators.toggle(key);
        self.store.set(StatePatch::new().active_indicators(indicators));
        active
    }

    /// Change the stored window. Clamping happens only when rendering.
    pub fn set_indicator_period(&mut self, key: impl Into<IndicatorKey>, period: usize) {
        let mut indicators = self.store.active_indicators();
        indicators.set_period(key, period);
        self.store.set(StatePatch::new().active_indicators(indicators));
    }

    /// Build the chart for the current selection.
    ///
    /// `None` until a series for the live selection has been applied.
    pub fn build_dataset(&self) -> Option<ChartDataset> {
        let main = self.main.as_ref()?;
        if main.snapshot != self.selection.snapshot() {
            return None;
        }

        let values = rates(&main.points);
        let mut series = vec![ChartSeries {
            name: main.pair(),
            color: MAIN_SERIES_COLOR.to_string(),
            values: values.iter().copied().map(Some).collect(),
        }];

        for overlay in self.selection.overlays().visible() {
            let Some(data) = &overlay.data else {
                continue;
            };
            series.push(ChartSeries {
                name: format!("{}/{}", main.base_currency, overlay.currency),
                color: overlay.color.clone(),
                values: align(&main.points, data),
            });
        }

        let n = values.len();
        for (key, config) in self.store.active_indicators().active() {
            let period = config.effective_period(n, self.max_period_fraction);
            match key {
                IndicatorKey::Sma => series.push(ChartSeries {
                    name: format!("SMA({period})"),
                    color: config.color.clone(),
                    values: sma(&values, period),
                }),
                IndicatorKey::Bollinger => {
                    let bands = volatility_bands(&values, period, self.band_width);
                    for band in Band::ALL {
                        series.push(ChartSeries {
                            name: format!("Bands {} ({period})", band.label()),
                            color: config.color.clone(),
                            values: bands.band(band).clone(),
                        });
                    }
                }
                IndicatorKey::Rsi => series.push(ChartSeries {
                    name: format!("RSI({period})"),
                    color: config.color.clone(),
                    values: momentum_oscillator(&values, period),
                }),
                IndicatorKey::Custom(name) => {
                    tracing::debug!(indicator = %name, "no computation for custom indicator");
                }
            }
        }

        Some(ChartDataset {
            labels: labels(&main.points),
            series,
        })
    }

    fn home_currency(&self) -> Option<String> {
        self.store
            .home_country()
            .and_then(|h| self.selection.resolver().currency_for(&h.name))
    }
}

/// Overlay rates on the main series' dates; `None` where the overlay has no
/// point for a date.
fn align(main: &[TimeSeriesPoint], overlay: &[TimeSeriesPoint]) -> Vec<Option<f64>> {
    let by_date: HashMap<NaiveDate, f64> = overlay.iter().map(|p| (p.date, p.rate)).collect();
    main.iter().map(|p| by_date.get(&p.date).copied()).collect()
}
