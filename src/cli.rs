//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvFeatureExporter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::json_snapshot_adapter::{JsonSnapshotAdapter, SnapshotCache};
use crate::domain::analysis::{
    INDICATOR_PREFIX, INDICATORS, QUERY_PREFIX, StorageBackend, StorageConfig, build_analysis_config,
    build_indicators, build_storage_config, query_names, resolve_query,
};
use crate::domain::config_validation::{
    validate_analysis_config, validate_indicator_config, validate_query_config,
    validate_storage_config,
};
use crate::domain::correlation::{self, CorrelationReport};
use crate::domain::error::SnaptrackError;
use crate::domain::indicator::parse_order;
use crate::domain::predicate_parser;
use crate::domain::rating::{rate_latest, rate_range};
use crate::domain::reconcile::{self, Departure, ReconcileRun};
use crate::domain::report::{
    RunReport, TickerReport, history_features, latest_features, ticker_reports,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::ports::snapshot_port::SnapshotPort;

#[derive(Parser, Debug)]
#[command(name = "snaptrack", about = "Daily snapshot reconciliation and indicator analysis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile daily selections and simulate the portfolio
    Cyclic {
        #[arg(short, long)]
        config: PathBuf,
        /// Named [query.<name>] section, defaults to analysis.default_query
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rate the universe of one day
    Rate {
        #[arg(short, long)]
        config: PathBuf,
        /// Defaults to analysis.end_date
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = 20)]
        top: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rank indicator combinations by relative performance
    Correlate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long, default_value_t = 20)]
        top: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export indicator feature vectors as CSV
    ExportFeatures {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        history: PathBuf,
        #[arg(long)]
        latest: PathBuf,
    },
    /// Load a JSON snapshot file into the SQLite store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: NaiveDate,
        #[arg(short, long)]
        input: PathBuf,
    },
    /// List available snapshot dates
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate the configuration and every predicate
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Cyclic {
            config,
            query,
            output,
        } => run_cyclic(&config, query.as_deref(), output.as_deref()),
        Command::Rate {
            config,
            date,
            top,
            output,
        } => run_rate(&config, date, top, output.as_deref()),
        Command::Correlate {
            config,
            depth,
            top,
            output,
        } => run_correlate(&config, depth, top, output.as_deref()),
        Command::ExportFeatures {
            config,
            history,
            latest,
        } => run_export_features(&config, &history, &latest),
        Command::Import {
            config,
            date,
            input,
        } => run_import(&config, date, &input),
        Command::Info { config } => run_info(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn exit_with(result: Result<(), SnaptrackError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Open the configured snapshot store and hand it to `f`.
pub fn with_snapshot_port<T>(
    storage: &StorageConfig,
    f: impl FnOnce(&dyn SnapshotPort) -> Result<T, SnaptrackError>,
) -> Result<T, SnaptrackError> {
    match storage.backend {
        StorageBackend::Json => {
            let cache = SnapshotCache::new();
            let port = JsonSnapshotAdapter::new(&storage.path, &cache);
            f(&port)
        }
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => {
            let port = open_sqlite(storage)?;
            f(&port)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => Err(SnaptrackError::ConfigInvalid {
            section: "storage".to_string(),
            key: "backend".to_string(),
            reason: "sqlite backend requires the sqlite feature".to_string(),
        }),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(
    storage: &StorageConfig,
) -> Result<crate::adapters::sqlite_adapter::SqliteAdapter, SnaptrackError> {
    let path = storage.path.to_str().ok_or_else(|| SnaptrackError::ConfigInvalid {
        section: "storage".to_string(),
        key: "path".to_string(),
        reason: "path is not valid UTF-8".to_string(),
    })?;
    let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::open(path, storage.pool_size)?;
    adapter.initialize_schema()?;
    Ok(adapter)
}

fn validate_all(config: &dyn ConfigPort, indicators: bool) -> Result<(), SnaptrackError> {
    validate_analysis_config(config)?;
    validate_storage_config(config)?;
    validate_query_config(config)?;
    if indicators {
        validate_indicator_config(config)?;
    }
    Ok(())
}

fn run_cyclic(config_path: &Path, query: Option<&str>, output: Option<&Path>) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    exit_with(cyclic(&config, query, output))
}

pub fn cyclic(
    config: &dyn ConfigPort,
    query: Option<&str>,
    output: Option<&Path>,
) -> Result<(), SnaptrackError> {
    validate_all(config, false)?;
    let analysis = build_analysis_config(config)?;
    let storage = build_storage_config(config)?;
    let (query_name, query) = resolve_query(config, &analysis, query)?;

    // Stage 2: Reconcile
    eprintln!(
        "Reconciling {query_name} ({query}) from {} to {}",
        analysis.start_date, analysis.end_date
    );
    let run = with_snapshot_port(&storage, |port| {
        reconcile::reconcile(
            port,
            analysis.start_date,
            analysis.end_date,
            &query,
            analysis.portfolio,
        )
    })?;

    // Stage 3: Print summary
    print_cyclic(&run);

    // Stage 4: Optional JSON export
    if let Some(path) = output {
        let report = RunReport::new(&run, query_name, analysis.start_date, analysis.end_date);
        JsonReportAdapter::pretty().write_run(&report, &path_str(path)?)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) if c >= 0.0 => format!("+{c:.2}%"),
        Some(c) => format!("{c:.2}%"),
        None => "?".to_string(),
    }
}

fn format_departures(departures: &[Departure]) -> String {
    departures
        .iter()
        .map(|d| format!("{} {}", d.record.ticker, format_change(d.change)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_cyclic(run: &ReconcileRun) {
    for day in &run.days {
        if day.arrivals.is_empty() && day.departures.is_empty() {
            continue;
        }
        let gap = if day.gap_days > 1 {
            format!(" (+{} days)", day.gap_days)
        } else {
            String::new()
        };
        println!("{}{gap}: {} selected", day.date, day.membership.len());
        if !day.arrivals.is_empty() {
            let tickers: Vec<&str> = day.arrivals.iter().map(|r| r.ticker.as_str()).collect();
            println!("  new:  {}", tickers.join(", "));
        }
        if !day.departures.is_empty() {
            println!("  gone: {}", format_departures(&day.departures));
            println!("  total: {}", format_change(Some(day.total_change)));
        }
    }

    println!("\n=== NOW ===");
    if run.current.is_empty() {
        println!("  (empty)");
    } else {
        println!("  {}", format_departures(&run.current));
        println!("  total: {}", format_change(Some(run.current_change)));
    }

    eprintln!("\n=== Portfolio ===");
    eprintln!("Bought:           {:.2}", run.portfolio.bought);
    eprintln!("Sold:             {:.2}", run.portfolio.sold);
    eprintln!("Round trips:      {}", run.portfolio.round_trips.len());
    eprintln!("Open holdings:    {}", run.portfolio.holding_count());
    eprintln!("Portfolio income: {:.4}", run.portfolio_income());
    if !run.skipped_dates.is_empty() {
        eprintln!("Skipped dates:    {}", run.skipped_dates.len());
    }
}

fn path_str(path: &Path) -> Result<String, SnaptrackError> {
    match path.to_str() {
        Some(s) => Ok(s.to_string()),
        None => {
            let message = format!("path is not valid UTF-8: {}", path.display());
            Err(SnaptrackError::Io(std::io::Error::other(message)))
        }
    }
}

fn run_rate(
    config_path: &Path,
    date: Option<NaiveDate>,
    top: usize,
    output: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    exit_with(rate(&config, date, top, output))
}

pub fn rate(
    config: &dyn ConfigPort,
    date: Option<NaiveDate>,
    top: usize,
    output: Option<&Path>,
) -> Result<(), SnaptrackError> {
    validate_all(config, true)?;
    let analysis = build_analysis_config(config)?;
    let storage = build_storage_config(config)?;
    let indicators = build_indicators(config)?;
    let date = date.unwrap_or(analysis.end_date);

    let day = with_snapshot_port(&storage, |port| {
        rate_latest(port, date, &indicators, analysis.max_lookback_days)
    })?;
    if day.date != date {
        eprintln!("No snapshot for {date}, using {}", day.date);
    }

    let reports = ticker_reports(&day, &indicators, None);
    print_ratings(&reports, top);

    if let Some(path) = output {
        JsonReportAdapter::pretty().write_ticker_reports(&reports, &path_str(path)?)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

fn print_ratings(reports: &[TickerReport], top: usize) {
    for report in reports.iter().take(top) {
        println!(
            "{:>4}/{} {:<8} {:>20} {}",
            report.place, report.total, report.ticker, report.rating, report.name
        );
        for plus in &report.pluses {
            println!("        + {plus}");
        }
        for neutral in &report.neutrals {
            println!("        ~ {neutral}");
        }
        for minus in &report.minuses {
            println!("        - {minus}");
        }
    }
}

fn run_correlate(
    config_path: &Path,
    depth: Option<usize>,
    top: usize,
    output: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    exit_with(correlate(&config, depth, top, output))
}

pub fn correlate(
    config: &dyn ConfigPort,
    depth: Option<usize>,
    top: usize,
    output: Option<&Path>,
) -> Result<(), SnaptrackError> {
    validate_all(config, true)?;
    let analysis = build_analysis_config(config)?;
    let storage = build_storage_config(config)?;
    let indicators = build_indicators(config)?;
    let depth = depth.unwrap_or(analysis.correlation_depth);
    correlation::validate_depth(depth)?;

    eprintln!(
        "Correlating {} indicators up to depth {depth} from {} to {}",
        indicators.len(),
        analysis.start_date,
        analysis.end_date
    );
    let report = with_snapshot_port(&storage, |port| {
        correlation::correlate(
            port,
            analysis.start_date,
            analysis.end_date,
            &indicators,
            depth,
        )
    })?;
    print_correlation(&report, top);

    if let Some(path) = output {
        JsonReportAdapter::pretty().write_correlation(&report, &path_str(path)?)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

fn print_correlation(report: &CorrelationReport, top: usize) {
    eprintln!("Rated days: {}", report.rated_days);
    println!("=== Combinations ===");
    for stats in report.combinations.iter().take(top) {
        println!(
            "{:>10.4} {:>5} pairs {:>5} tickers  {}",
            stats.performance,
            stats.pairs,
            stats.hits,
            stats.indicators.join(" + ")
        );
    }

    if let Some(last) = report.last_date {
        println!("\n=== Attribution ({last}) ===");
    }
    for entry in report.attribution.iter().take(top) {
        let best = entry
            .best
            .as_ref()
            .map(|s| format!("{} ({:.4})", s.combination, s.performance))
            .unwrap_or_else(|| "-".to_string());
        let worst = entry
            .worst
            .as_ref()
            .map(|s| format!("{} ({:.4})", s.combination, s.performance))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:>10.4}  best: {best}  worst: {worst}",
            entry.ticker, entry.total
        );
    }
}

fn run_export_features(config_path: &Path, history: &Path, latest: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    exit_with(export_features(&config, history, latest))
}

pub fn export_features(
    config: &dyn ConfigPort,
    history: &Path,
    latest: &Path,
) -> Result<(), SnaptrackError> {
    validate_all(config, true)?;
    let analysis = build_analysis_config(config)?;
    let storage = build_storage_config(config)?;
    let indicators = build_indicators(config)?;

    let days = with_snapshot_port(&storage, |port| {
        rate_range(port, analysis.start_date, analysis.end_date, &indicators)
    })?;
    let last = days.last().ok_or(SnaptrackError::NoSnapshot {
        date: analysis.end_date,
    })?;

    let exporter = CsvFeatureExporter::new(&indicators);
    let history_rows = history_features(&days, &indicators);
    exporter.write_history_file(&history_rows, history)?;
    let latest_rows = latest_features(last, &indicators);
    exporter.write_latest_file(&latest_rows, latest)?;

    eprintln!(
        "Wrote {} history rows to {} and {} latest rows ({}) to {}",
        history_rows.len(),
        history.display(),
        latest_rows.len(),
        last.date,
        latest.display()
    );
    Ok(())
}

fn run_import(config_path: &Path, date: NaiveDate, input: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    exit_with(import(&config, date, input))
}

pub fn import(config: &dyn ConfigPort, date: NaiveDate, input: &Path) -> Result<(), SnaptrackError> {
    validate_storage_config(config)?;
    let storage = build_storage_config(config)?;
    if storage.backend != StorageBackend::Sqlite {
        return Err(SnaptrackError::ConfigInvalid {
            section: "storage".to_string(),
            key: "backend".to_string(),
            reason: "import requires backend = sqlite".to_string(),
        });
    }

    #[cfg(feature = "sqlite")]
    {
        let records = crate::adapters::json_snapshot_adapter::read_snapshot_file(input)?;
        let adapter = open_sqlite(&storage)?;
        let count = adapter.insert_records(date, &records)?;
        eprintln!("Imported {count} records for {date}");
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (date, input);
        Err(SnaptrackError::ConfigInvalid {
            section: "storage".to_string(),
            key: "backend".to_string(),
            reason: "sqlite backend requires the sqlite feature".to_string(),
        })
    }
}

fn run_info(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    exit_with(info(&config))
}

pub fn info(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    validate_storage_config(config)?;
    let storage = build_storage_config(config)?;
    let dates = with_snapshot_port(&storage, |port| port.available_dates())?;
    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => {
            for date in &dates {
                println!("{date}");
            }
            eprintln!("{} snapshots, {first} to {last}", dates.len());
        }
        _ => eprintln!("No snapshots found in {}", storage.path.display()),
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&config, false) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    for name in query_names(&config) {
        let section = format!("{QUERY_PREFIX}{name}");
        let filter = config.get_string(&section, "filter").unwrap_or_default();
        if let Err(code) = check_predicate(&format!("Query {name}"), &filter) {
            return code;
        }
    }

    if config.get_string(INDICATORS, "order").is_some() {
        if let Err(e) = validate_indicator_config(&config) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        let names = match parse_order(&config.get_string(INDICATORS, "order").unwrap_or_default())
        {
            Ok(n) => n,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(2);
            }
        };
        for name in names {
            let section = format!("{INDICATOR_PREFIX}{name}");
            let filter = config.get_string(&section, "filter").unwrap_or_default();
            if let Err(code) = check_predicate(&format!("Indicator {name}"), &filter) {
                return code;
            }
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn check_predicate(label: &str, text: &str) -> Result<(), ExitCode> {
    eprintln!("\n{label}:");
    if text.trim().is_empty() {
        eprintln!("  Parsed: ALL");
        return Ok(());
    }
    match predicate_parser::parse(text) {
        Ok(predicate) => {
            eprintln!("  Parsed: {predicate}");
            eprintln!("  Raw:    {text}");
            Ok(())
        }
        Err(e) => {
            eprintln!("  error: {}", e.display_with_context(text));
            Err((&SnaptrackError::from(e)).into())
        }
    }
}
