//! Background fetch thread.
//!
//! The selection machine and chart session live on one thread and hold `Rc`
//! state. Rate fetches are handed to this worker over `mpsc` channels and
//! the results come back tagged with the request they answer, so the session
//! can drop anything that arrives after the selection moved on.

use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::domain::TimeSeriesPoint;
use crate::events::{RefreshRequest, SelectionEvent};
use crate::rates::{RateError, RateSource};

/// Commands sent from the session to the worker.
#[derive(Debug, Clone)]
pub enum FetchCommand {
    /// Series for the main pair.
    MainSeries(RefreshRequest),
    /// Series for one overlay currency against the home currency.
    Overlay {
        base_currency: String,
        quote_currency: String,
        range_days: u32,
    },
    Shutdown,
}

/// Responses sent from the worker back to the session.
#[derive(Debug, Clone)]
pub enum FetchResponse {
    MainSeries {
        request: RefreshRequest,
        result: Result<Vec<TimeSeriesPoint>, RateError>,
    },
    Overlay {
        base_currency: String,
        currency: String,
        result: Result<Vec<TimeSeriesPoint>, RateError>,
    },
}

impl FetchCommand {
    /// The fetch a selection event asks for, if any.
    pub fn from_event(event: &SelectionEvent) -> Option<Self> {
        match event {
            SelectionEvent::RefreshRequested(request) => Some(FetchCommand::MainSeries(request.clone())),
            SelectionEvent::OverlayFetchRequested {
                base_currency,
                quote_currency,
                range_days,
            } => Some(FetchCommand::Overlay {
                base_currency: base_currency.clone(),
                quote_currency: quote_currency.clone(),
                range_days: *range_days,
            }),
            _ => None,
        }
    }
}

/// Spawn the fetch thread. It exits on `Shutdown` or when either channel
/// is closed.
pub fn spawn_worker(
    rx: Receiver<FetchCommand>,
    tx: Sender<FetchResponse>,
    source: Arc<dyn RateSource>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("fxatlas-fetch".into())
        .spawn(move || worker_loop(rx, tx, source))
}

fn worker_loop(rx: Receiver<FetchCommand>, tx: Sender<FetchResponse>, source: Arc<dyn RateSource>) {
    tracing::info!(source = source.name(), "fetch worker started");
    loop {
        match rx.recv() {
            Ok(cmd) => match handle_command(cmd, source.as_ref()) {
                Some(response) => {
                    if tx.send(response).is_err() {
                        break;
                    }
                }
                None => break,
            },
            Err(_) => break,
        }
    }
    tracing::info!("fetch worker stopped");
}

fn handle_command(cmd: FetchCommand, source: &dyn RateSource) -> Option<FetchResponse> {
    match cmd {
        FetchCommand::MainSeries(request) => {
            let result = source.fetch_series(
                &request.base_currency,
                &request.quote_currency,
                request.range_days,
            );
            log_result(&request.base_currency, &request.quote_currency, &result);
            Some(FetchResponse::MainSeries { request, result })
        }
        FetchCommand::Overlay {
            base_currency,
            quote_currency,
            range_days,
        } => {
            let result = source.fetch_series(&base_currency, &quote_currency, range_days);
            log_result(&base_currency, &quote_currency, &result);
            Some(FetchResponse::Overlay {
                base_currency,
                currency: quote_currency,
                result,
            })
        }
        FetchCommand::Shutdown => None,
    }
}

fn log_result(base: &str, quote: &str, result: &Result<Vec<TimeSeriesPoint>, RateError>) {
    match result {
        Ok(points) => tracing::debug!(base, quote, points = points.len(), "series fetched"),
        Err(e) => tracing::warn!(base, quote, error = %e, "series fetch failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SelectionSnapshot;
    use crate::rates::StaticRateSource;
    use chrono::NaiveDate;
    use std::sync::mpsc;

    fn point(day: u32, rate: f64) -> TimeSeriesPoint {
        TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2024, 3, day).unwrap(), rate)
    }

    fn request(id: u64) -> RefreshRequest {
        RefreshRequest {
            id,
            snapshot: SelectionSnapshot {
                home: Some("France".into()),
                destination: Some("Japan".into()),
            },
            base_currency: "EUR".into(),
            quote_currency: "JPY".into(),
            range_days: 30,
        }
    }

    #[test]
    fn worker_answers_in_order_and_shuts_down() {
        let source = StaticRateSource::new()
            .with_series("EUR", "JPY", vec![point(1, 160.0), point(4, 161.5)])
            .with_series("EUR", "SEK", vec![point(1, 11.2)]);
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let handle = spawn_worker(cmd_rx, resp_tx, Arc::new(source)).unwrap();

        cmd_tx.send(FetchCommand::MainSeries(request(7))).unwrap();
        cmd_tx
            .send(FetchCommand::Overlay {
                base_currency: "EUR".into(),
                quote_currency: "SEK".into(),
                range_days: 30,
            })
            .unwrap();
        cmd_tx.send(FetchCommand::Shutdown).unwrap();

        match resp_rx.recv().unwrap() {
            FetchResponse::MainSeries { request, result } => {
                assert_eq!(request.id, 7);
                assert_eq!(result.unwrap().len(), 2);
            }
            other => panic!("unexpected response: {other:?}"),
        }
        match resp_rx.recv().unwrap() {
            FetchResponse::Overlay {
                base_currency,
                currency,
                result,
            } => {
                assert_eq!(base_currency, "EUR");
                assert_eq!(currency, "SEK");
                assert_eq!(result.unwrap()[0].rate, 11.2);
            }
            other => panic!("unexpected response: {other:?}"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn errors_are_forwarded() {
        let source = StaticRateSource::new().with_error(
            "EUR",
            "JPY",
            RateError::NetworkUnreachable("offline".into()),
        );
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let handle = spawn_worker(cmd_rx, resp_tx, Arc::new(source)).unwrap();

        cmd_tx.send(FetchCommand::MainSeries(request(1))).unwrap();
        drop(cmd_tx);

        match resp_rx.recv().unwrap() {
            FetchResponse::MainSeries { result, .. } => {
                assert_eq!(result, Err(RateError::NetworkUnreachable("offline".into())));
            }
            other => panic!("unexpected response: {other:?}"),
        }
        // Closed command channel stops the loop
        handle.join().unwrap();
    }

    #[test]
    fn commands_from_events() {
        let main = FetchCommand::from_event(&SelectionEvent::RefreshRequested(request(3)));
        assert!(matches!(main, Some(FetchCommand::MainSeries(r)) if r.id == 3));

        let overlay = FetchCommand::from_event(&SelectionEvent::OverlayFetchRequested {
            base_currency: "EUR".into(),
            quote_currency: "GBP".into(),
            range_days: 90,
        });
        assert!(matches!(
            overlay,
            Some(FetchCommand::Overlay { range_days: 90, .. })
        ));

        assert!(FetchCommand::from_event(&SelectionEvent::MapLocked).is_none());
    }
}
