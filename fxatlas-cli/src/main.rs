//! FX Atlas CLI: chart, indicator and directory commands.
//!
//! Commands:
//! - `chart`: select a home country and destinations, fetch the series and
//!   print the chart dataset (summary table or JSON)
//! - `indicators`: compute one indicator over a single pair
//! - `countries`: list the currency directory

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{mpsc, Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use fxatlas_core::domain::{labels, rates};
use fxatlas_core::indicators::{momentum_oscillator, sma, volatility_bands, Band};
use fxatlas_core::persistence::{self, PersistedPreferences};
use fxatlas_core::{
    spawn_worker, AppConfig, ApplyOutcome, ChartDataset, ChartSession, CsvRateSource,
    CurrencyDirectory, CurrencyResolver, FetchCommand, FetchResponse, RateSource, RecordingSink,
    SelectionKind, StaticEntitlement, SyntheticRateSource, Tier,
};

#[derive(Parser)]
#[command(name = "fxatlas", about = "FX Atlas CLI: compare exchange rates between countries")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Currency directory TOML. Defaults to the built-in table.
    #[arg(long, global = true)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chart the rate between a home country and one or more destinations.
    Chart {
        /// Home country (e.g., France).
        #[arg(long)]
        home: String,

        /// Destination countries; the first is the main pair.
        #[arg(long = "to", required = true, num_args = 1..)]
        destinations: Vec<String>,

        /// Premium tier (five destinations instead of two).
        #[arg(long, default_value_t = false)]
        premium: bool,

        /// Indicators to show: sma, bollinger, rsi.
        #[arg(long = "indicator")]
        indicators: Vec<String>,

        /// Extra overlay currencies (e.g., GBP).
        #[arg(long = "overlay")]
        overlays: Vec<String>,

        #[command(flatten)]
        source: SourceArgs,

        /// Print the dataset as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Load and save preferences at the configured path.
        #[arg(long, default_value_t = false)]
        remember: bool,
    },
    /// Compute one indicator over a currency pair.
    Indicators {
        /// Base currency.
        #[arg(long)]
        base: String,

        /// Quote currency.
        #[arg(long)]
        quote: String,

        #[arg(value_enum)]
        kind: IndicatorKind,

        /// Window. Defaults to the configured period for the indicator.
        #[arg(long)]
        period: Option<usize>,

        /// Band width multiplier. Defaults to the configured width.
        #[arg(long)]
        width: Option<f64>,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// List countries and their currencies.
    Countries {
        /// Only countries using this currency.
        #[arg(long)]
        currency: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum IndicatorKind {
    Sma,
    Bollinger,
    Rsi,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Directory of BASE_QUOTE.csv files. Without it a synthetic series is used.
    #[arg(long)]
    rates_dir: Option<PathBuf>,

    /// Last date of the synthetic series (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Days of history. Defaults to the configured range.
    #[arg(long)]
    range_days: Option<u32>,
}

impl SourceArgs {
    fn rate_source(&self) -> Result<Arc<dyn RateSource>> {
        if let Some(dir) = &self.rates_dir {
            return Ok(Arc::new(CsvRateSource::new(dir)));
        }
        let source = match &self.end {
            Some(end) => SyntheticRateSource::new(NaiveDate::parse_from_str(end, "%Y-%m-%d")?),
            None => SyntheticRateSource::today(),
        };
        Ok(Arc::new(source))
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let directory = match &cli.directory {
        Some(path) => CurrencyDirectory::from_file(path)?,
        None => CurrencyDirectory::default_world(),
    };

    match cli.command {
        Commands::Chart {
            home,
            destinations,
            premium,
            indicators,
            overlays,
            source,
            json,
            remember,
        } => {
            if let Some(days) = source.range_days {
                config.chart.range_days = days;
            }
            let opts = ChartOptions {
                home,
                destinations,
                premium,
                indicators,
                overlays,
                json,
                remember,
            };
            run_chart(&config, directory, &source, opts)
        }
        Commands::Indicators {
            base,
            quote,
            kind,
            period,
            width,
            source,
        } => run_indicator(&config, &source, &base, &quote, kind, period, width),
        Commands::Countries { currency } => run_countries(&directory, currency.as_deref()),
    }
}

struct ChartOptions {
    home: String,
    destinations: Vec<String>,
    premium: bool,
    indicators: Vec<String>,
    overlays: Vec<String>,
    json: bool,
    remember: bool,
}

fn run_chart(
    config: &AppConfig,
    directory: CurrencyDirectory,
    source: &SourceArgs,
    opts: ChartOptions,
) -> Result<()> {
    let sink = RecordingSink::new();
    let mut session = ChartSession::new(config, Rc::new(directory), Rc::new(sink.clone()));

    let prefs_path = &config.storage.preferences_path;
    let saved = opts.remember.then(|| {
        tracing::debug!(path = %prefs_path.display(), "loading preferences");
        persistence::load(prefs_path)
    });
    prepare_session(&mut session, &opts, saved)?;

    fetch_all(&mut session, &sink, source.rate_source()?)?;

    let dataset = session
        .build_dataset()
        .ok_or_else(|| anyhow!("no series available for the selected pair"))?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&dataset)?);
    } else {
        print_summary(&dataset);
    }

    if opts.remember {
        persistence::save(prefs_path, &persistence::extract(&session))
            .with_context(|| format!("saving preferences to {}", prefs_path.display()))?;
    }
    Ok(())
}

/// Apply the tier, selection, saved preferences and requested extras, in
/// that order. Saved overlays go in after the destinations, since adding
/// destinations rebuilds the overlay list.
fn prepare_session(
    session: &mut ChartSession,
    opts: &ChartOptions,
    saved: Option<PersistedPreferences>,
) -> Result<()> {
    let premium = opts.premium || saved.as_ref().is_some_and(|p| p.is_premium_user);
    if premium {
        session
            .selection_mut()
            .sync_entitlement(&StaticEntitlement(Tier::Premium));
    }

    select_countries(session, &opts.home, &opts.destinations)?;
    if let Some(mut prefs) = saved {
        prefs.is_premium_user = premium;
        persistence::apply(session, prefs);
    }

    for key in &opts.indicators {
        if !session.store().active_indicators().is_active(&key.as_str().into()) {
            session.toggle_indicator(key.as_str());
        }
    }
    for currency in &opts.overlays {
        if !session.add_overlay(currency) {
            eprintln!("Overlay {currency} not added (duplicate, malformed or three already visible)");
        }
    }
    Ok(())
}

fn select_countries(session: &mut ChartSession, home: &str, destinations: &[String]) -> Result<()> {
    let selection = session.selection_mut();
    if !selection.select_by_name(home, SelectionKind::Home, None) {
        bail!("unknown country '{home}'");
    }
    match destinations {
        [only] => {
            if !selection.select_by_name(only, SelectionKind::Destination, None) {
                bail!("'{only}' cannot be a destination");
            }
        }
        many => {
            for name in many {
                if !selection.add_destination(name) {
                    eprintln!(
                        "Destination {name} not added (unknown, duplicate or over the {} limit)",
                        selection.destination_cap()
                    );
                }
            }
        }
    }
    if selection.store().destination_country().is_none() {
        bail!("no destination selected");
    }
    Ok(())
}

/// Run every outstanding fetch through the worker and apply the results.
fn fetch_all(
    session: &mut ChartSession,
    sink: &RecordingSink,
    source: Arc<dyn RateSource>,
) -> Result<()> {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();
    let handle = spawn_worker(cmd_rx, resp_tx, source)?;

    // Only the latest refresh matters; overlays are taken from the session
    let mut commands: Vec<FetchCommand> = sink
        .drain()
        .iter()
        .filter_map(FetchCommand::from_event)
        .filter(|c| matches!(c, FetchCommand::MainSeries(_)))
        .last()
        .into_iter()
        .collect();
    commands.extend(session.pending_overlay_fetches());
    tracing::info!(commands = commands.len(), "fetching series");

    for cmd in &commands {
        cmd_tx.send(cmd.clone())?;
    }
    let mut main_error = None;
    for _ in &commands {
        let response = resp_rx.recv()?;
        let is_main = matches!(response, FetchResponse::MainSeries { .. });
        match session.handle_response(response) {
            ApplyOutcome::Failed(e) if is_main => main_error = Some(e),
            ApplyOutcome::Failed(e) => eprintln!("Overlay fetch failed: {e}"),
            ApplyOutcome::Applied | ApplyOutcome::Stale => {}
        }
    }

    cmd_tx.send(FetchCommand::Shutdown)?;
    handle
        .join()
        .map_err(|_| anyhow!("fetch worker panicked"))?;

    match main_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn print_summary(dataset: &ChartDataset) {
    let (Some(first), Some(last)) = (dataset.labels.first(), dataset.labels.last()) else {
        println!("Empty series");
        return;
    };
    println!("{first} to {last} ({} points)", dataset.labels.len());
    println!();
    println!("{:<28} {:>12} {:>12} {:>12}", "Series", "Last", "Min", "Max");
    println!("{}", "-".repeat(67));
    for series in &dataset.series {
        let defined: Vec<f64> = series.values.iter().flatten().copied().collect();
        let last = series.values.last().copied().flatten();
        let min = defined.iter().copied().reduce(f64::min);
        let max = defined.iter().copied().reduce(f64::max);
        println!(
            "{:<28} {:>12} {:>12} {:>12}",
            series.name,
            format_value(last),
            format_value(min),
            format_value(max)
        );
    }
}

fn format_value(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "-".into())
}

fn run_indicator(
    config: &AppConfig,
    source: &SourceArgs,
    base: &str,
    quote: &str,
    kind: IndicatorKind,
    period: Option<usize>,
    width: Option<f64>,
) -> Result<()> {
    let range_days = source.range_days.unwrap_or(config.chart.range_days);
    let points = source
        .rate_source()?
        .fetch_series(&base.to_ascii_uppercase(), &quote.to_ascii_uppercase(), range_days)?;
    let values = rates(&points);
    let dates = labels(&points);
    let defaults = &config.indicators;

    let (header, columns): (Vec<String>, Vec<Vec<Option<f64>>>) = match kind {
        IndicatorKind::Sma => {
            let period = period.unwrap_or(defaults.sma_period);
            (vec![format!("sma_{period}")], vec![sma(&values, period)])
        }
        IndicatorKind::Bollinger => {
            let period = period.unwrap_or(defaults.bollinger_period);
            let bands = volatility_bands(&values, period, width.unwrap_or(defaults.bollinger_width));
            (
                Band::ALL.iter().map(|b| b.label().to_string()).collect(),
                Band::ALL.iter().map(|b| bands.band(*b).clone()).collect(),
            )
        }
        IndicatorKind::Rsi => {
            let period = period.unwrap_or(defaults.rsi_period);
            (vec![format!("rsi_{period}")], vec![momentum_oscillator(&values, period)])
        }
    };

    print!("{:<12} {:>12}", "date", "rate");
    for h in &header {
        print!(" {h:>12}");
    }
    println!();
    for (i, date) in dates.iter().enumerate() {
        print!("{date:<12} {:>12.4}", values[i]);
        for column in &columns {
            print!(" {:>12}", format_value(column[i]));
        }
        println!();
    }
    Ok(())
}

fn run_countries(directory: &CurrencyDirectory, currency: Option<&str>) -> Result<()> {
    let filter = currency.map(str::to_ascii_uppercase);
    println!("{:<32} {}", "Country", "Currency");
    println!("{}", "-".repeat(41));
    for name in directory.country_names() {
        let Some(code) = directory.currency_for(name) else {
            continue;
        };
        if filter.as_deref().is_some_and(|f| f != code) {
            continue;
        }
        println!("{name:<32} {code}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_chart() {
        let cli = Cli::try_parse_from([
            "fxatlas", "chart", "--home", "France", "--to", "Japan", "Sweden", "--indicator",
            "sma", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Chart {
                destinations, json, ..
            } => {
                assert_eq!(destinations, vec!["Japan", "Sweden"]);
                assert!(json);
            }
            _ => panic!("expected chart"),
        }
    }

    #[test]
    fn select_countries_rejects_unknown_home() {
        let mut session = ChartSession::new(
            &AppConfig::default(),
            Rc::new(CurrencyDirectory::default_world()),
            Rc::new(RecordingSink::new()),
        );
        assert!(select_countries(&mut session, "Atlantis", &["Japan".into()]).is_err());
        assert!(select_countries(&mut session, "France", &["Japan".into()]).is_ok());
    }

    #[test]
    fn chart_fetches_through_worker() {
        let sink = RecordingSink::new();
        let mut session = ChartSession::new(
            &AppConfig::default(),
            Rc::new(CurrencyDirectory::default_world()),
            Rc::new(sink.clone()),
        );
        select_countries(&mut session, "France", &["Japan".into()]).unwrap();
        session.add_overlay("GBP");

        let end = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        fetch_all(&mut session, &sink, Arc::new(SyntheticRateSource::new(end))).unwrap();

        let dataset = session.build_dataset().unwrap();
        assert!(dataset.series("EUR/JPY").is_some());
        assert!(dataset.series("EUR/GBP").is_some());
    }

    #[test]
    fn saved_overlays_survive_several_destinations() {
        let mut session = ChartSession::new(
            &AppConfig::default(),
            Rc::new(CurrencyDirectory::default_world()),
            Rc::new(RecordingSink::new()),
        );
        let opts = ChartOptions {
            home: "France".into(),
            destinations: vec!["Japan".into(), "Sweden".into()],
            premium: false,
            indicators: vec!["sma".into()],
            overlays: Vec::new(),
            json: false,
            remember: true,
        };
        let saved = PersistedPreferences {
            overlays: vec!["CHF".into()],
            ..PersistedPreferences::default()
        };
        prepare_session(&mut session, &opts, Some(saved)).unwrap();

        let overlays = session.selection().overlays().list();
        let codes: Vec<&str> = overlays.iter().map(|o| o.currency.as_str()).collect();
        assert_eq!(codes, vec!["SEK", "CHF"]);
        assert!(!overlays[1].is_from_destinations);
        assert_eq!(persistence::extract(&session).overlays, vec!["CHF"]);
        assert!(session
            .store()
            .active_indicators()
            .is_active(&"sma".into()));
    }
}
