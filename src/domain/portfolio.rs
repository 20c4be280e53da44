//! Threshold-driven portfolio simulation.
//!
//! A ticker is bought when it re-enters the selection with a cumulative
//! realized return at or above the allocation threshold, and sold on its next
//! fresh departure. Position size scales with how far the ledger exceeds the
//! threshold.

use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;

use super::position::{Holding, RoundTrip};
use super::record::EntityRecord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioConfig {
    /// Minimum cumulative realized return (percent) for an allocation.
    pub allocation_threshold: f64,
    /// Cash allocated per unit of `ledger / allocation_threshold`.
    pub cash_unit: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            allocation_threshold: 10.0,
            cash_unit: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub config: PortfolioConfig,
    pub holdings: HashMap<String, Holding>,
    pub round_trips: Vec<RoundTrip>,
    pub bought: f64,
    pub sold: f64,
}

impl Portfolio {
    pub fn new(config: PortfolioConfig) -> Self {
        Portfolio {
            config,
            holdings: HashMap::new(),
            round_trips: Vec::new(),
            bought: 0.0,
            sold: 0.0,
        }
    }

    pub fn is_held(&self, ticker: &str) -> bool {
        self.holdings.contains_key(ticker)
    }

    /// Open a holding for an arriving record if its ledger value qualifies.
    /// Returns `true` when a holding was opened.
    pub fn consider_arrival(&mut self, record: &EntityRecord, ledger: f64, date: NaiveDate) -> bool {
        let threshold = self.config.allocation_threshold;
        let Some(price) = record.price.filter(|p| *p > 0.0) else {
            return false;
        };
        if threshold <= 0.0 || ledger < threshold || self.is_held(&record.ticker) {
            return false;
        }
        let shares = self.config.cash_unit * (ledger / threshold) / price;
        debug!(
            "{}: allocating {:.4} shares of {} at {} (ledger {:.2}%)",
            date, shares, record.ticker, price, ledger
        );
        self.holdings.insert(
            record.ticker.clone(),
            Holding {
                ticker: record.ticker.clone(),
                shares,
                entry_price: price,
                entry_date: date,
                entry_ledger: ledger,
            },
        );
        true
    }

    /// Close the holding of a departing ticker. Only fresh departures with a
    /// known price close; anything else keeps the holding open.
    pub fn consider_departure(
        &mut self,
        record: &EntityRecord,
        fresh: bool,
        date: NaiveDate,
    ) -> Option<&RoundTrip> {
        if !fresh {
            return None;
        }
        let price = record.price?;
        let holding = self.holdings.remove(&record.ticker)?;
        let trip = holding.close(price, date);
        self.bought += trip.bought;
        self.sold += trip.sold;
        debug!(
            "{}: closed {} ({:.2} -> {:.2})",
            date, trip.ticker, trip.bought, trip.sold
        );
        self.round_trips.push(trip);
        self.round_trips.last()
    }

    /// `sold / bought` over closed round trips, `0` when nothing was bought.
    pub fn income(&self) -> f64 {
        if self.bought == 0.0 {
            0.0
        } else {
            self.sold / self.bought
        }
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 5, d).unwrap()
    }

    fn config() -> PortfolioConfig {
        PortfolioConfig {
            allocation_threshold: 10.0,
            cash_unit: 100.0,
        }
    }

    #[test]
    fn new_portfolio_has_zero_income() {
        let portfolio = Portfolio::new(config());
        assert_eq!(portfolio.income(), 0.0);
        assert_eq!(portfolio.holding_count(), 0);
    }

    #[test]
    fn arrival_below_threshold_is_ignored() {
        let mut portfolio = Portfolio::new(config());
        let rec = EntityRecord::new("A").with_price(10.0);
        assert!(!portfolio.consider_arrival(&rec, 9.99, day(1)));
        assert!(!portfolio.is_held("A"));
    }

    #[test]
    fn arrival_sizes_by_ledger_ratio() {
        let mut portfolio = Portfolio::new(config());
        let rec = EntityRecord::new("A").with_price(10.0);
        assert!(portfolio.consider_arrival(&rec, 20.0, day(1)));
        let holding = &portfolio.holdings["A"];
        assert!((holding.shares - 20.0).abs() < 1e-9);
        assert_eq!(holding.entry_ledger, 20.0);
    }

    #[test]
    fn arrival_requires_positive_price_and_no_existing_holding() {
        let mut portfolio = Portfolio::new(config());
        assert!(!portfolio.consider_arrival(&EntityRecord::new("A"), 50.0, day(1)));
        let zero = EntityRecord::new("A").with_price(0.0);
        assert!(!portfolio.consider_arrival(&zero, 50.0, day(1)));

        let rec = EntityRecord::new("A").with_price(5.0);
        assert!(portfolio.consider_arrival(&rec, 10.0, day(1)));
        assert!(!portfolio.consider_arrival(&rec, 30.0, day(2)));
        assert!((portfolio.holdings["A"].shares - 20.0).abs() < 1e-9);
    }

    #[test]
    fn fresh_departure_closes_holding() {
        let mut portfolio = Portfolio::new(config());
        portfolio.consider_arrival(&EntityRecord::new("A").with_price(10.0), 10.0, day(1));
        let exit = EntityRecord::new("A").with_price(12.0);
        let trip = portfolio.consider_departure(&exit, true, day(3)).cloned().unwrap();
        assert!((trip.bought - 100.0).abs() < 1e-9);
        assert!((trip.sold - 120.0).abs() < 1e-9);
        assert!(!portfolio.is_held("A"));
        assert!((portfolio.income() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn stale_or_unpriced_departure_keeps_holding() {
        let mut portfolio = Portfolio::new(config());
        portfolio.consider_arrival(&EntityRecord::new("A").with_price(10.0), 10.0, day(1));
        let exit = EntityRecord::new("A").with_price(12.0);
        assert!(portfolio.consider_departure(&exit, false, day(2)).is_none());
        assert!(
            portfolio
                .consider_departure(&EntityRecord::new("A"), true, day(2))
                .is_none()
        );
        assert!(portfolio.is_held("A"));
        assert_eq!(portfolio.bought, 0.0);
        assert_eq!(portfolio.income(), 0.0);
    }

    #[test]
    fn departure_of_unheld_ticker_is_noop() {
        let mut portfolio = Portfolio::new(config());
        let exit = EntityRecord::new("B").with_price(3.0);
        assert!(portfolio.consider_departure(&exit, true, day(2)).is_none());
        assert!(portfolio.round_trips.is_empty());
    }
}
