//! Report rows derived from ratings, ledgers and reconciliation runs.

use chrono::NaiveDate;
use serde::Serialize;

use super::indicator::IndicatorSet;
use super::ledger::{ProfitLedger, round2};
use super::position::{Holding, RoundTrip};
use super::rating::DayRating;
use super::reconcile::{DayResult, Departure, ReconcileRun};
use crate::ports::prediction_port::GrowthModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerReport {
    pub ticker: String,
    pub name: String,
    /// 1-based position in the ranked list.
    pub place: usize,
    /// Number of rated tickers that day.
    pub total: usize,
    pub rating: u64,
    pub pluses: Vec<String>,
    pub neutrals: Vec<String>,
    pub minuses: Vec<String>,
    pub prediction: Option<f64>,
}

/// One report per rated ticker, in ranked order.
pub fn ticker_reports(
    day: &DayRating,
    indicators: &IndicatorSet,
    model: Option<&dyn GrowthModel>,
) -> Vec<TickerReport> {
    let ranked = day.ranked();
    let total = ranked.len();
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, rating)| {
            let mut pluses = Vec::new();
            let mut neutrals = Vec::new();
            let mut minuses = Vec::new();
            for def in indicators.iter() {
                if indicators.is_set(rating.rating, def.rank) {
                    pluses.push(def.present.clone());
                } else if def.neutral {
                    neutrals.push(def.absent.clone());
                } else {
                    minuses.push(def.absent.clone());
                }
            }
            let prediction = model.map(|m| m.predict(&indicators.features(rating.rating)));
            TickerReport {
                ticker: rating.ticker.clone(),
                name: rating.name.clone().unwrap_or_default(),
                place: i + 1,
                total,
                rating: rating.rating,
                pluses,
                neutrals,
                minuses,
                prediction,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnHistory {
    pub ticker: String,
    pub total: f64,
    pub returns: Vec<f64>,
}

/// Realized returns per ticker, total descending, ticker ascending on ties.
pub fn return_history(ledger: &ProfitLedger) -> Vec<ReturnHistory> {
    let mut rows: Vec<ReturnHistory> = ledger
        .totals()
        .iter()
        .map(|(ticker, total)| ReturnHistory {
            ticker: ticker.clone(),
            total: round2(*total),
            returns: ledger.returns_for(ticker),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    rows
}

/// Feature vector of one ticker on the latest rated day.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub ticker: String,
    pub name: String,
    pub features: Vec<bool>,
}

/// Feature vector of one ticker on day `P` with its price growth to the
/// next rated day.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub features: Vec<bool>,
    pub growth_percent: f64,
}

pub fn latest_features(day: &DayRating, indicators: &IndicatorSet) -> Vec<FeatureRow> {
    day.ratings
        .iter()
        .map(|r| FeatureRow {
            ticker: r.ticker.clone(),
            name: r.name.clone().unwrap_or_default(),
            features: indicators.features(r.rating),
        })
        .collect()
}

/// Pair consecutive rated days. Tickers without a known, non-zero price on
/// the earlier day or a known price on the later day are omitted.
pub fn history_features(days: &[DayRating], indicators: &IndicatorSet) -> Vec<HistoryRow> {
    let mut rows = Vec::new();
    for pair in days.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        for rating in &before.ratings {
            let Some(was) = rating.price.filter(|p| *p != 0.0) else {
                continue;
            };
            let Some(now) = after.get(&rating.ticker).and_then(|r| r.price) else {
                continue;
            };
            rows.push(HistoryRow {
                features: indicators.features(rating.rating),
                growth_percent: round2((now / was - 1.0) * 100.0),
            });
        }
    }
    rows
}

/// Serializable summary of a reconciliation run.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub query: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: &'a [DayResult],
    pub current: &'a [Departure],
    pub current_change: f64,
    pub skipped_dates: &'a [NaiveDate],
    pub portfolio_income: f64,
    pub bought: f64,
    pub sold: f64,
    pub round_trips: &'a [RoundTrip],
    /// Holdings still open at run end, by ticker.
    pub open_holdings: Vec<&'a Holding>,
    pub returns: Vec<ReturnHistory>,
}

impl<'a> RunReport<'a> {
    pub fn new(run: &'a ReconcileRun, query: String, start: NaiveDate, end: NaiveDate) -> Self {
        let mut open_holdings: Vec<&Holding> = run.portfolio.holdings.values().collect();
        open_holdings.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Self {
            query,
            start,
            end,
            days: &run.days,
            current: &run.current,
            current_change: run.current_change,
            skipped_dates: &run.skipped_dates,
            portfolio_income: run.portfolio_income(),
            bought: run.portfolio.bought,
            sold: run.portfolio.sold,
            round_trips: &run.portfolio.round_trips,
            open_holdings,
            returns: return_history(&run.ledger),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::Query;
    use crate::domain::rating::EntityRating;

    struct HalfModel;

    impl GrowthModel for HalfModel {
        fn predict(&self, features: &[bool]) -> f64 {
            features.iter().filter(|f| **f).count() as f64 / features.len() as f64
        }
    }

    fn indicators() -> IndicatorSet {
        let mut set = IndicatorSet::new();
        set.push("cheap", Query::all(), "Trades below holder cost", "Trades above holder cost", false)
            .unwrap();
        set.push("trend", Query::all(), "Uptrend", "No clear trend", true)
            .unwrap();
        set.push("analysts", Query::all(), "Analysts say buy", "Analysts are cautious", false)
            .unwrap();
        set
    }

    fn entity(ticker: &str, price: Option<f64>, rating: u64) -> EntityRating {
        EntityRating {
            ticker: ticker.into(),
            name: Some(format!("{ticker} Inc")),
            price,
            indicators: Vec::new(),
            rating,
        }
    }

    fn day(d: u32, ratings: Vec<EntityRating>) -> DayRating {
        DayRating {
            date: NaiveDate::from_ymd_opt(2021, 8, d).unwrap(),
            ratings,
        }
    }

    #[test]
    fn ticker_reports_split_descriptions() {
        let set = indicators();
        let d = day(2, vec![entity("B", None, 0b001), entity("A", None, 0b100)]);
        let reports = ticker_reports(&d, &set, Some(&HalfModel));

        let a = &reports[0];
        assert_eq!((a.ticker.as_str(), a.place, a.total), ("A", 1, 2));
        assert_eq!(a.pluses, vec!["Trades below holder cost"]);
        assert_eq!(a.neutrals, vec!["No clear trend"]);
        assert_eq!(a.minuses, vec!["Analysts are cautious"]);
        assert!((a.prediction.unwrap() - 1.0 / 3.0).abs() < 1e-12);

        let b = &reports[1];
        assert_eq!(b.place, 2);
        assert_eq!(b.pluses, vec!["Analysts say buy"]);
        assert_eq!(b.minuses, vec!["Trades above holder cost"]);
    }

    #[test]
    fn ticker_reports_without_model_have_no_prediction() {
        let set = indicators();
        let d = day(2, vec![entity("A", None, 0)]);
        assert_eq!(ticker_reports(&d, &set, None)[0].prediction, None);
    }

    #[test]
    fn return_history_ranks_by_total() {
        let mut ledger = ProfitLedger::new();
        let date = NaiveDate::from_ymd_opt(2021, 8, 1).unwrap();
        ledger.record(date, "LOW", -3.0);
        ledger.record(date, "HIGH", 5.0);
        ledger.record(date, "HIGH", 1.5);
        ledger.record(date, "MID", 6.5);

        let rows = return_history(&ledger);
        let order: Vec<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, vec!["HIGH", "MID", "LOW"]);
        assert_eq!(rows[0].returns, vec![5.0, 1.5]);
    }

    #[test]
    fn latest_features_follow_declared_order() {
        let set = indicators();
        let rows = latest_features(&day(1, vec![entity("A", Some(1.0), 0b101)]), &set);
        assert_eq!(rows[0].features, vec![true, false, true]);
        assert_eq!(rows[0].name, "A Inc");
    }

    #[test]
    fn history_features_pair_consecutive_days() {
        let set = indicators();
        let days = vec![
            day(1, vec![
                entity("A", Some(10.0), 0b100),
                entity("B", None, 0b010),
                entity("C", Some(0.0), 0b001),
                entity("D", Some(4.0), 0b001),
            ]),
            day(2, vec![entity("A", Some(11.0), 0), entity("B", Some(1.0), 0)]),
            day(3, vec![entity("A", Some(9.9), 0b010)]),
        ];
        let rows = history_features(&days, &set);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].features, vec![true, false, false]);
        assert_eq!(rows[0].growth_percent, 10.0);
        assert_eq!(rows[1].features, vec![false, false, false]);
        assert_eq!(rows[1].growth_percent, -10.0);
    }
}
