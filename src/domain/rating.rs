//! Indicator rating of one day's universe.
//!
//! Every ticker of the day starts at rating 0. Each indicator that selects
//! the ticker adds its weight, so ratings compare lexicographically by the
//! declared indicator order.

use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

use super::error::SnaptrackError;
use super::indicator::IndicatorSet;
use super::query::Query;
use super::record::check_unique;
use crate::ports::snapshot_port::SnapshotPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRating {
    pub ticker: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    /// Satisfied indicator names, in declared order.
    pub indicators: Vec<String>,
    pub rating: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRating {
    pub date: NaiveDate,
    /// In universe order.
    pub ratings: Vec<EntityRating>,
}

impl DayRating {
    /// Rating descending, ticker ascending.
    pub fn ranked(&self) -> Vec<&EntityRating> {
        let mut ranked: Vec<&EntityRating> = self.ratings.iter().collect();
        ranked.sort_by(|a, b| b.rating.cmp(&a.rating).then_with(|| a.ticker.cmp(&b.ticker)));
        ranked
    }

    pub fn get(&self, ticker: &str) -> Option<&EntityRating> {
        self.ratings.iter().find(|r| r.ticker == ticker)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

/// Rate every ticker of `date`. A missing snapshot surfaces as
/// [`SnaptrackError::NoSnapshot`] from the port; a ticker listed twice is an
/// [`SnaptrackError::Invariant`].
pub fn rate(
    port: &dyn SnapshotPort,
    date: NaiveDate,
    indicators: &IndicatorSet,
) -> Result<DayRating, SnaptrackError> {
    let universe = port.select(date, &Query::all())?;
    check_unique(date, &universe)?;
    let mut ratings: Vec<EntityRating> = universe
        .into_iter()
        .map(|r| EntityRating {
            ticker: r.ticker,
            name: r.name,
            price: r.price,
            indicators: Vec::new(),
            rating: 0,
        })
        .collect();
    let index: HashMap<String, usize> = ratings
        .iter()
        .enumerate()
        .map(|(i, r)| (r.ticker.clone(), i))
        .collect();

    for definition in indicators.iter() {
        let weight = indicators.weight(definition.rank);
        let selected = port.select(date, &definition.query)?;
        debug!("{date}: {} selects {} tickers", definition.name, selected.len());
        for record in selected {
            match index.get(&record.ticker) {
                Some(&i) => {
                    let rating = &mut ratings[i];
                    if rating.rating & weight == 0 {
                        rating.rating |= weight;
                        rating.indicators.push(definition.name.clone());
                    }
                }
                None => warn!(
                    "{date}: {} selected {} outside the day's universe",
                    definition.name, record.ticker
                ),
            }
        }
    }

    Ok(DayRating { date, ratings })
}

/// Rate `date`, falling back to earlier calendar days while no snapshot
/// exists, at most `max_lookback_days` times. Other errors stop the search.
pub fn rate_latest(
    port: &dyn SnapshotPort,
    date: NaiveDate,
    indicators: &IndicatorSet,
    max_lookback_days: u32,
) -> Result<DayRating, SnaptrackError> {
    let mut day = date;
    let mut attempts = 0;
    loop {
        match rate(port, day, indicators) {
            Err(e) if e.is_no_snapshot() && attempts < max_lookback_days => {
                debug!("{day}: no snapshot, trying the day before");
                day = day.pred_opt().ok_or(SnaptrackError::NoSnapshot { date: day })?;
                attempts += 1;
            }
            result => return result,
        }
    }
}

/// Rate every day of `[start, end]` that has a snapshot, in date order.
pub fn rate_range(
    port: &dyn SnapshotPort,
    start: NaiveDate,
    end: NaiveDate,
    indicators: &IndicatorSet,
) -> Result<Vec<DayRating>, SnaptrackError> {
    let mut days = Vec::new();
    for date in start.iter_days().take_while(|d| *d <= end) {
        if !port.snapshot_exists(date)? {
            debug!("{date}: no snapshot, skipping");
            continue;
        }
        days.push(rate(port, date, indicators)?);
    }
    Ok(days)
}
