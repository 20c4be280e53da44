//! Simulated holdings and completed round trips.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub ticker: String,
    pub shares: f64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    /// Ledger value of the ticker when the holding was opened.
    pub entry_ledger: f64,
}

impl Holding {
    pub fn cost(&self) -> f64 {
        self.shares * self.entry_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }

    pub fn close(self, exit_price: f64, exit_date: NaiveDate) -> RoundTrip {
        RoundTrip {
            bought: self.cost(),
            sold: self.market_value(exit_price),
            ticker: self.ticker,
            shares: self.shares,
            entry_price: self.entry_price,
            exit_price,
            entry_date: self.entry_date,
            exit_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundTrip {
    pub ticker: String,
    pub shares: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub bought: f64,
    pub sold: f64,
}

impl RoundTrip {
    pub fn pnl(&self) -> f64 {
        self.sold - self.bought
    }
}
