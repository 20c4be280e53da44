//! Arrival baselines and cumulative realized returns.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use super::error::SnaptrackError;
use super::record::EntityRecord;

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage return of a departure against its arrival baseline.
///
/// A zero baseline price always yields `0`. Otherwise `None` when the
/// departure was not re-observed on the departure day or a price is missing.
pub fn realized_change(baseline: &EntityRecord, exit: &EntityRecord, fresh: bool) -> Option<f64> {
    let entry_price = baseline.price?;
    if entry_price == 0.0 {
        return Some(0.0);
    }
    if !fresh {
        return None;
    }
    let exit_price = exit.price?;
    Some(round2((exit_price / entry_price - 1.0) * 100.0))
}

/// Most recent arrival record per ticker. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct TickerTable {
    entries: HashMap<String, EntityRecord>,
}

impl TickerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: EntityRecord) {
        self.entries.insert(record.ticker.clone(), record);
    }

    pub fn get(&self, ticker: &str) -> Option<&EntityRecord> {
        self.entries.get(ticker)
    }

    /// Baseline of a departing ticker. A ticker can only depart after it
    /// arrived, so a missing entry means the run state is corrupt.
    pub fn baseline(&self, ticker: &str) -> Result<&EntityRecord, SnaptrackError> {
        self.entries
            .get(ticker)
            .ok_or_else(|| SnaptrackError::Invariant {
                reason: format!("ticker {ticker} departed without an arrival baseline"),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealizedReturn {
    pub date: NaiveDate,
    pub ticker: String,
    pub change: f64,
}

/// Cumulative realized % return per ticker plus every individual return in
/// the order it was realized.
#[derive(Debug, Clone, Default)]
pub struct ProfitLedger {
    totals: HashMap<String, f64>,
    history: Vec<RealizedReturn>,
}

impl ProfitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, date: NaiveDate, ticker: &str, change: f64) {
        *self.totals.entry(ticker.to_string()).or_insert(0.0) += change;
        self.history.push(RealizedReturn {
            date,
            ticker: ticker.to_string(),
            change,
        });
    }

    /// Cumulative return of `ticker`, `0` if it never realized one.
    pub fn value(&self, ticker: &str) -> f64 {
        self.totals.get(ticker).copied().unwrap_or(0.0)
    }

    pub fn totals(&self) -> &HashMap<String, f64> {
        &self.totals
    }

    pub fn history(&self) -> &[RealizedReturn] {
        &self.history
    }

    pub fn returns_for(&self, ticker: &str) -> Vec<f64> {
        self.history
            .iter()
            .filter(|r| r.ticker == ticker)
            .map(|r| r.change)
            .collect()
    }
}
