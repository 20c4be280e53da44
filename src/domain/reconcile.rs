//! Day-by-day set reconciliation over a date range.
//!
//! Each processed day is compared with the last day that had a snapshot:
//! tickers that left the selection are departures, tickers that joined are
//! arrivals. Departures realize a return against the ticker's arrival
//! baseline and feed the ledger and the portfolio; arrivals refresh the
//! baseline and may open a holding.

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;

use super::error::SnaptrackError;
use super::ledger::{ProfitLedger, TickerTable, realized_change};
use super::portfolio::{Portfolio, PortfolioConfig};
use super::query::Query;
use super::record::{EntityRecord, check_unique, membership};
use crate::ports::snapshot_port::SnapshotPort;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MembershipDiff {
    /// In `current` snapshot order.
    pub arrivals: Vec<EntityRecord>,
    /// In `previous` snapshot order, carrying the previous day's record.
    pub departures: Vec<EntityRecord>,
}

pub fn diff_membership(previous: &[EntityRecord], current: &[EntityRecord]) -> MembershipDiff {
    let before = membership(previous);
    let after = membership(current);
    MembershipDiff {
        arrivals: current
            .iter()
            .filter(|r| !before.contains(r.ticker.as_str()))
            .cloned()
            .collect(),
        departures: previous
            .iter()
            .filter(|r| !after.contains(r.ticker.as_str()))
            .cloned()
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    pub record: EntityRecord,
    /// Realized return in percent, `None` when unknown.
    pub change: Option<f64>,
    /// Whether the record was re-observed on the departure day.
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayResult {
    pub date: NaiveDate,
    /// Calendar days since the previous processed snapshot, 0 on the first.
    pub gap_days: i64,
    pub arrivals: Vec<EntityRecord>,
    pub departures: Vec<Departure>,
    pub total_change: f64,
    /// Tickers selected on this day, in snapshot order.
    pub membership: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReconcileRun {
    pub days: Vec<DayResult>,
    /// Records still selected at run end with their return so far.
    pub current: Vec<Departure>,
    pub current_change: f64,
    pub skipped_dates: Vec<NaiveDate>,
    pub tickers: TickerTable,
    pub ledger: ProfitLedger,
    pub portfolio: Portfolio,
}

impl ReconcileRun {
    pub fn portfolio_income(&self) -> f64 {
        self.portfolio.income()
    }
}

/// Mutable state of one reconciliation pass.
struct Reconciler {
    previous: Vec<EntityRecord>,
    last_date: Option<NaiveDate>,
    tickers: TickerTable,
    ledger: ProfitLedger,
    portfolio: Portfolio,
    days: Vec<DayResult>,
    skipped_dates: Vec<NaiveDate>,
}

impl Reconciler {
    fn new(config: PortfolioConfig) -> Self {
        Self {
            previous: Vec::new(),
            last_date: None,
            tickers: TickerTable::new(),
            ledger: ProfitLedger::new(),
            portfolio: Portfolio::new(config),
            days: Vec::new(),
            skipped_dates: Vec::new(),
        }
    }

    fn advance(
        &mut self,
        port: &dyn SnapshotPort,
        date: NaiveDate,
        current: Vec<EntityRecord>,
    ) -> Result<(), SnaptrackError> {
        let diff = diff_membership(&self.previous, &current);

        let mut departures = Vec::with_capacity(diff.departures.len());
        let mut total_change = 0.0;
        for gone in diff.departures {
            let (record, fresh) = match port.lookup(date, &gone.ticker)? {
                Some(fresher) => (fresher, true),
                None => (gone, false),
            };
            let baseline = self.tickers.baseline(&record.ticker)?;
            let change = realized_change(baseline, &record, fresh);
            match change {
                Some(c) => {
                    self.ledger.record(date, &record.ticker, c);
                    total_change += c;
                }
                None if fresh => warn!("{date}: {} departed without a usable price", record.ticker),
                None => debug!("{date}: {} not found on departure day", record.ticker),
            }
            self.portfolio.consider_departure(&record, fresh, date);
            departures.push(Departure {
                record,
                change,
                fresh,
            });
        }

        for arrival in &diff.arrivals {
            self.tickers.insert(arrival.clone());
            let ledger = self.ledger.value(&arrival.ticker);
            self.portfolio.consider_arrival(arrival, ledger, date);
        }

        let gap_days = self
            .last_date
            .map(|last| (date - last).num_days())
            .unwrap_or(0);
        if gap_days > 1 {
            debug!("{date}: bridging a {gap_days}-day gap");
        }

        self.days.push(DayResult {
            date,
            gap_days,
            arrivals: diff.arrivals,
            departures,
            total_change,
            membership: current.iter().map(|r| r.ticker.clone()).collect(),
        });
        self.previous = current;
        self.last_date = Some(date);
        Ok(())
    }

    /// Treat every still-selected record as departing on the last processed
    /// day. Updates the ledger only; holdings stay open.
    fn finish(mut self) -> Result<ReconcileRun, SnaptrackError> {
        let mut current = Vec::with_capacity(self.previous.len());
        let mut current_change = 0.0;
        if let Some(date) = self.last_date {
            for record in std::mem::take(&mut self.previous) {
                let baseline = self.tickers.baseline(&record.ticker)?;
                let change = realized_change(baseline, &record, true);
                if let Some(c) = change {
                    self.ledger.record(date, &record.ticker, c);
                    current_change += c;
                }
                current.push(Departure {
                    record,
                    change,
                    fresh: true,
                });
            }
        }

        info!(
            "reconciled {} days ({} skipped), {} still selected, {} round trips",
            self.days.len(),
            self.skipped_dates.len(),
            current.len(),
            self.portfolio.round_trips.len()
        );

        Ok(ReconcileRun {
            days: self.days,
            current,
            current_change,
            skipped_dates: self.skipped_dates,
            tickers: self.tickers,
            ledger: self.ledger,
            portfolio: self.portfolio,
        })
    }
}

/// Walk `[start, end]` day by day, reconciling the selection of `query`.
///
/// Dates without a snapshot are skipped and the comparison baseline stays
/// the last processed day. Storage failures propagate.
pub fn reconcile(
    port: &dyn SnapshotPort,
    start: NaiveDate,
    end: NaiveDate,
    query: &Query,
    config: PortfolioConfig,
) -> Result<ReconcileRun, SnaptrackError> {
    let mut state = Reconciler::new(config);
    for date in start.iter_days().take_while(|d| *d <= end) {
        if !port.snapshot_exists(date)? {
            debug!("{date}: no snapshot, skipping");
            state.skipped_dates.push(date);
            continue;
        }
        let current = port.select(date, query)?;
        check_unique(date, &current)?;
        state.advance(port, date, current)?;
    }
    state.finish()
}
