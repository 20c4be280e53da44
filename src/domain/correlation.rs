//! Historical performance of indicator combinations.
//!
//! For every pair of rated days `P < D`, tickers present on both days are
//! grouped by each indicator combination they satisfied on `P`. A group's
//! relative price change from `P` to `D` is folded into the combination's
//! aggregate. Only a compact per-day form is retained, never the pair
//! product.

use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use super::error::SnaptrackError;
use super::indicator::IndicatorSet;
use super::rating::{DayRating, rate};
use crate::ports::snapshot_port::SnapshotPort;

pub const MAX_DEPTH: usize = 4;

/// Ticker → (price, rating mask) for one rated day.
#[derive(Debug, Clone)]
struct CompactDay {
    date: NaiveDate,
    entries: HashMap<String, (Option<f64>, u64)>,
}

impl From<&DayRating> for CompactDay {
    fn from(day: &DayRating) -> Self {
        Self {
            date: day.date,
            entries: day
                .ratings
                .iter()
                .map(|r| (r.ticker.clone(), (r.price, r.rating)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Aggregate {
    mask: u64,
    performance: f64,
    pairs: usize,
    hits: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationStats {
    pub indicators: Vec<String>,
    pub performance: f64,
    pub pairs: usize,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationScore {
    pub combination: String,
    pub performance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerAttribution {
    pub ticker: String,
    pub name: Option<String>,
    pub indicators: Vec<String>,
    pub best: Option<CombinationScore>,
    pub worst: Option<CombinationScore>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub depth: usize,
    pub rated_days: usize,
    pub last_date: Option<NaiveDate>,
    /// Performance descending, ties in declaration order.
    pub combinations: Vec<CombinationStats>,
    /// Tickers of the last rated day, total descending.
    pub attribution: Vec<TickerAttribution>,
}

pub fn validate_depth(depth: usize) -> Result<(), SnaptrackError> {
    if (1..=MAX_DEPTH).contains(&depth) {
        Ok(())
    } else {
        Err(SnaptrackError::ConfigInvalid {
            section: "analysis".to_string(),
            key: "correlation_depth".to_string(),
            reason: format!("must be between 1 and {MAX_DEPTH}, got {depth}"),
        })
    }
}

pub struct CorrelationEngine<'a> {
    indicators: &'a IndicatorSet,
    depth: usize,
    aggregates: Vec<Aggregate>,
    index: HashMap<u64, usize>,
    history: Vec<CompactDay>,
    last: Option<DayRating>,
}

impl<'a> CorrelationEngine<'a> {
    pub fn new(indicators: &'a IndicatorSet, depth: usize) -> Result<Self, SnaptrackError> {
        validate_depth(depth)?;
        let mut aggregates = Vec::new();
        let mut index = HashMap::new();
        for size in 1..=depth.min(indicators.len()) {
            for ranks in (0..indicators.len()).combinations(size) {
                let mask = ranks.iter().fold(0, |m, &r| m | indicators.weight(r));
                index.insert(mask, aggregates.len());
                aggregates.push(Aggregate {
                    mask,
                    ..Aggregate::default()
                });
            }
        }
        debug!("tracking {} indicator combinations", aggregates.len());
        Ok(Self {
            indicators,
            depth,
            aggregates,
            index,
            history: Vec::new(),
            last: None,
        })
    }

    /// Non-empty sub-combinations of `mask` with at most `depth` members.
    fn subsets(&self, mask: u64) -> Vec<u64> {
        let bits: Vec<u64> = (0..64)
            .map(|b| 1u64 << b)
            .filter(|bit| mask & bit != 0)
            .collect();
        (1..=self.depth.min(bits.len()))
            .flat_map(|size| {
                bits.iter()
                    .combinations(size)
                    .map(|combo| combo.into_iter().fold(0, |m, b| m | b))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Fold a new rated day against every earlier one. Days must arrive in
    /// increasing date order.
    pub fn push(&mut self, day: DayRating) {
        let current = CompactDay::from(&day);
        for previous in &self.history {
            let mut sums: HashMap<u64, (f64, f64)> = HashMap::new();
            for (ticker, &(was_price, mask)) in &previous.entries {
                let Some(&(now_price, _)) = current.entries.get(ticker) else {
                    continue;
                };
                for subset in self.subsets(mask) {
                    let Some(&slot) = self.index.get(&subset) else {
                        continue;
                    };
                    self.aggregates[slot].hits.insert(ticker.clone());
                    if let (Some(was), Some(now)) = (was_price, now_price) {
                        let entry = sums.entry(subset).or_insert((0.0, 0.0));
                        entry.0 += was;
                        entry.1 += now;
                    }
                }
            }
            for (subset, (was, now)) in sums {
                if was != 0.0 {
                    if let Some(&slot) = self.index.get(&subset) {
                        let aggregate = &mut self.aggregates[slot];
                        aggregate.performance += (now - was) / was;
                        aggregate.pairs += 1;
                    }
                }
            }
            debug!("folded {} -> {}", previous.date, current.date);
        }
        self.history.push(current);
        self.last = Some(day);
    }

    fn score(&self, mask: u64) -> Option<CombinationScore> {
        let slot = *self.index.get(&mask)?;
        Some(CombinationScore {
            combination: self.indicators.describe(mask),
            performance: self.aggregates[slot].performance,
        })
    }

    fn attribute(&self, day: &DayRating) -> Vec<TickerAttribution> {
        let mut rows: Vec<TickerAttribution> = day
            .ratings
            .iter()
            .map(|rating| {
                let scores: Vec<CombinationScore> = self
                    .subsets(rating.rating)
                    .into_iter()
                    .filter_map(|m| self.score(m))
                    .collect();
                let total: f64 = scores.iter().map(|s| s.performance).sum();
                let best = scores
                    .iter()
                    .max_by(|a, b| a.performance.total_cmp(&b.performance))
                    .cloned();
                let worst = scores
                    .iter()
                    .min_by(|a, b| a.performance.total_cmp(&b.performance))
                    .cloned();
                TickerAttribution {
                    ticker: rating.ticker.clone(),
                    name: rating.name.clone(),
                    indicators: rating.indicators.clone(),
                    best,
                    worst,
                    total,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        rows
    }

    pub fn finish(self) -> CorrelationReport {
        let mut ranked: Vec<&Aggregate> = self.aggregates.iter().collect();
        ranked.sort_by(|a, b| b.performance.total_cmp(&a.performance));
        let combinations = ranked
            .into_iter()
            .map(|a| CombinationStats {
                indicators: self
                    .indicators
                    .satisfied(a.mask)
                    .map(|d| d.name.clone())
                    .collect(),
                performance: a.performance,
                pairs: a.pairs,
                hits: a.hits.len(),
            })
            .collect();
        let attribution = self
            .last
            .as_ref()
            .map(|day| self.attribute(day))
            .unwrap_or_default();

        CorrelationReport {
            depth: self.depth,
            rated_days: self.history.len(),
            last_date: self.last.as_ref().map(|d| d.date),
            combinations,
            attribution,
        }
    }

    /// Number of distinct tickers ever observed holding `names` together.
    pub fn hits(&self, names: &[&str]) -> Option<usize> {
        let mask = names.iter().try_fold(0u64, |m, name| {
            let def = self.indicators.get(name)?;
            Some(m | self.indicators.weight(def.rank))
        })?;
        let slot = *self.index.get(&mask)?;
        Some(self.aggregates[slot].hits.len())
    }
}

/// Rate every day of `[start, end]` with a snapshot and fold the ratings.
pub fn correlate(
    port: &dyn SnapshotPort,
    start: NaiveDate,
    end: NaiveDate,
    indicators: &IndicatorSet,
    depth: usize,
) -> Result<CorrelationReport, SnaptrackError> {
    let mut engine = CorrelationEngine::new(indicators, depth)?;
    for date in start.iter_days().take_while(|d| *d <= end) {
        if !port.snapshot_exists(date)? {
            debug!("{date}: no snapshot, skipping");
            continue;
        }
        engine.push(rate(port, date, indicators)?);
    }
    let report = engine.finish();
    info!(
        "correlated {} rated days over {} combinations",
        report.rated_days,
        report.combinations.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::Query;
    use crate::domain::rating::EntityRating;
    use approx::assert_relative_eq;

    fn indicators() -> IndicatorSet {
        let mut set = IndicatorSet::new();
        for name in ["a", "b", "c"] {
            set.push(name, Query::all(), "", "", false).unwrap();
        }
        set
    }

    fn day(d: u32, entries: &[(&str, Option<f64>, u64)]) -> DayRating {
        DayRating {
            date: NaiveDate::from_ymd_opt(2021, 7, d).unwrap(),
            ratings: entries
                .iter()
                .map(|&(ticker, price, rating)| EntityRating {
                    ticker: ticker.into(),
                    name: None,
                    price,
                    indicators: Vec::new(),
                    rating,
                })
                .collect(),
        }
    }

    #[test]
    fn depth_is_validated() {
        let set = indicators();
        assert!(CorrelationEngine::new(&set, 0).is_err());
        assert!(CorrelationEngine::new(&set, 5).is_err());
        assert!(CorrelationEngine::new(&set, 4).is_ok());
    }

    #[test]
    fn all_combinations_are_precreated() {
        let set = indicators();
        let report = CorrelationEngine::new(&set, 2).unwrap().finish();
        assert_eq!(report.combinations.len(), 6);
        assert!(report.combinations.iter().all(|c| c.pairs == 0));
        assert_eq!(report.combinations[0].indicators, vec!["a"]);
        assert_eq!(report.combinations[3].indicators, vec!["a", "b"]);
    }

    #[test]
    fn pairs_fold_relative_performance() {
        let set = indicators();
        let ab = set.weight(0) | set.weight(1);
        let mut engine = CorrelationEngine::new(&set, 2).unwrap();
        engine.push(day(1, &[("X", Some(10.0), ab), ("Y", Some(10.0), set.weight(0))]));
        engine.push(day(2, &[("X", Some(12.0), 0), ("Y", Some(8.0), 0)]));

        let report = engine.finish();
        let find = |names: &[&str]| {
            report
                .combinations
                .iter()
                .find(|c| c.indicators == names)
                .unwrap()
                .clone()
        };
        assert_relative_eq!(find(&["a"]).performance, 0.0);
        assert_eq!(find(&["a"]).hits, 2);
        assert_relative_eq!(find(&["b"]).performance, 0.2);
        assert_relative_eq!(find(&["a", "b"]).performance, 0.2);
        assert_eq!(find(&["a", "b"]).hits, 1);
        assert_eq!(find(&["c"]).pairs, 0);
        assert_eq!(report.combinations[0].performance, 0.2);
    }

    #[test]
    fn unknown_prices_record_hits_only() {
        let set = indicators();
        let mut engine = CorrelationEngine::new(&set, 1).unwrap();
        engine.push(day(1, &[("X", None, set.weight(2))]));
        engine.push(day(2, &[("X", Some(5.0), 0)]));
        assert_eq!(engine.hits(&["c"]), Some(1));
        let report = engine.finish();
        let c = report
            .combinations
            .iter()
            .find(|c| c.indicators == ["c"])
            .unwrap();
        assert_eq!(c.pairs, 0);
    }

    #[test]
    fn attribution_covers_last_day_subsets() {
        let set = indicators();
        let a = set.weight(0);
        let b = set.weight(1);
        let mut engine = CorrelationEngine::new(&set, 2).unwrap();
        engine.push(day(1, &[("X", Some(10.0), a), ("Y", Some(10.0), b)]));
        engine.push(day(2, &[("X", Some(11.0), a | b), ("Y", Some(9.0), 0)]));

        let report = engine.finish();
        assert_eq!(report.rated_days, 2);
        let x = &report.attribution[0];
        assert_eq!(x.ticker, "X");
        assert_eq!(x.best.as_ref().unwrap().combination, "a");
        assert_relative_eq!(x.best.as_ref().unwrap().performance, 0.1);
        assert_eq!(x.worst.as_ref().unwrap().combination, "b");
        assert_relative_eq!(x.total, 0.1 - 0.1 + 0.0, epsilon = 1e-12);

        let y = &report.attribution[1];
        assert!(y.best.is_none());
        assert_eq!(y.total, 0.0);
    }
}
