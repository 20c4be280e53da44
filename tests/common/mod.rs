#![allow(dead_code)]

use chrono::NaiveDate;
use snaptrack::domain::error::SnaptrackError;
use snaptrack::domain::indicator::IndicatorSet;
use snaptrack::domain::query::Query;
pub use snaptrack::domain::record::EntityRecord;
use snaptrack::ports::snapshot_port::SnapshotPort;
use std::cell::Cell;
use std::collections::BTreeMap;

/// In-memory snapshot store keyed by date.
pub struct MockSnapshotPort {
    pub days: BTreeMap<NaiveDate, Vec<EntityRecord>>,
    pub failing: Option<NaiveDate>,
    pub selects: Cell<usize>,
}

impl MockSnapshotPort {
    pub fn new() -> Self {
        Self {
            days: BTreeMap::new(),
            failing: None,
            selects: Cell::new(0),
        }
    }

    pub fn with_day(mut self, date: NaiveDate, records: Vec<EntityRecord>) -> Self {
        self.days.insert(date, records);
        self
    }

    /// `select` on `date` fails with a storage error.
    pub fn with_failure(mut self, date: NaiveDate) -> Self {
        self.failing = Some(date);
        self
    }
}

impl SnapshotPort for MockSnapshotPort {
    fn snapshot_exists(&self, date: NaiveDate) -> Result<bool, SnaptrackError> {
        Ok(self.days.contains_key(&date))
    }

    fn select(&self, date: NaiveDate, query: &Query) -> Result<Vec<EntityRecord>, SnaptrackError> {
        self.selects.set(self.selects.get() + 1);
        if self.failing == Some(date) {
            return Err(SnaptrackError::Storage {
                reason: format!("injected failure on {date}"),
            });
        }
        let records = self
            .days
            .get(&date)
            .ok_or(SnaptrackError::NoSnapshot { date })?;
        Ok(query.apply(records.iter().cloned()))
    }

    fn lookup(
        &self,
        date: NaiveDate,
        ticker: &str,
    ) -> Result<Option<EntityRecord>, SnaptrackError> {
        Ok(self
            .days
            .get(&date)
            .and_then(|records| records.iter().find(|r| r.ticker == ticker).cloned()))
    }

    fn available_dates(&self) -> Result<Vec<NaiveDate>, SnaptrackError> {
        Ok(self.days.keys().copied().collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn priced(ticker: &str, price: f64) -> EntityRecord {
    EntityRecord::new(ticker).with_price(price)
}

/// Record with a numeric `score` attribute used by test predicates.
pub fn scored(ticker: &str, price: f64, score: f64) -> EntityRecord {
    priced(ticker, price).with_attribute("score", score)
}

/// One indicator per name, selecting records whose boolean attribute of the
/// same name is true.
pub fn flag_indicators(names: &[&str]) -> IndicatorSet {
    let mut set = IndicatorSet::new();
    for name in names {
        let query = Query::parse_filter(&format!("EQUALS({name}, true)")).unwrap();
        set.push(*name, query, *name, format!("not {name}"), false)
            .unwrap();
    }
    set
}

pub fn flagged(ticker: &str, price: f64, flags: &[&str]) -> EntityRecord {
    let mut record = priced(ticker, price);
    for flag in flags {
        record = record.with_attribute(*flag, true);
    }
    record
}
