//! Analysis parameters, storage selection, named queries and indicators,
//! built from configuration.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::SnaptrackError;
use super::indicator::{IndicatorSet, parse_order};
use super::portfolio::PortfolioConfig;
use super::predicate_parser;
use super::query::{Query, SortOrder};
use crate::ports::config_port::ConfigPort;

pub const ANALYSIS: &str = "analysis";
pub const STORAGE: &str = "storage";
pub const INDICATORS: &str = "indicators";
pub const INDICATOR_PREFIX: &str = "indicator.";
pub const QUERY_PREFIX: &str = "query.";

pub const DEFAULT_CORRELATION_DEPTH: i64 = 2;
pub const DEFAULT_MAX_LOOKBACK_DAYS: i64 = 7;
pub const DEFAULT_POOL_SIZE: i64 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub portfolio: PortfolioConfig,
    pub correlation_depth: usize,
    pub max_lookback_days: u32,
    pub default_query: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Json,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!("expected json or sqlite, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
    pub pool_size: u32,
}

pub fn parse_date(value: Option<&str>, section: &str, key: &str) -> Result<NaiveDate, SnaptrackError> {
    match value {
        None => Err(SnaptrackError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            SnaptrackError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: "invalid date format (expected YYYY-MM-DD)".to_string(),
            }
        }),
    }
}

fn non_negative_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, SnaptrackError> {
    let value = config.get_int(section, key, default);
    if value < 0 {
        return Err(SnaptrackError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be non-negative"),
        });
    }
    Ok(value)
}

pub fn build_analysis_config(config: &dyn ConfigPort) -> Result<AnalysisConfig, SnaptrackError> {
    let start_date = parse_date(
        config.get_string(ANALYSIS, "start_date").as_deref(),
        ANALYSIS,
        "start_date",
    )?;
    let end_date = parse_date(
        config.get_string(ANALYSIS, "end_date").as_deref(),
        ANALYSIS,
        "end_date",
    )?;
    let defaults = PortfolioConfig::default();

    Ok(AnalysisConfig {
        start_date,
        end_date,
        portfolio: PortfolioConfig {
            allocation_threshold: config.get_double(
                ANALYSIS,
                "allocation_threshold",
                defaults.allocation_threshold,
            ),
            cash_unit: config.get_double(ANALYSIS, "cash_unit", defaults.cash_unit),
        },
        correlation_depth: non_negative_int(
            config,
            ANALYSIS,
            "correlation_depth",
            DEFAULT_CORRELATION_DEPTH,
        )? as usize,
        max_lookback_days: non_negative_int(
            config,
            ANALYSIS,
            "max_lookback_days",
            DEFAULT_MAX_LOOKBACK_DAYS,
        )? as u32,
        default_query: config
            .get_string(ANALYSIS, "default_query")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty()),
    })
}

pub fn build_storage_config(config: &dyn ConfigPort) -> Result<StorageConfig, SnaptrackError> {
    let backend = match config.get_string(STORAGE, "backend") {
        Some(s) => s.parse().map_err(|reason| SnaptrackError::ConfigInvalid {
            section: STORAGE.to_string(),
            key: "backend".to_string(),
            reason,
        })?,
        None => StorageBackend::Json,
    };
    let path = config
        .get_string(STORAGE, "path")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| SnaptrackError::ConfigMissing {
            section: STORAGE.to_string(),
            key: "path".to_string(),
        })?;
    let pool_size = config.get_int(STORAGE, "pool_size", DEFAULT_POOL_SIZE);
    if pool_size < 1 {
        return Err(SnaptrackError::ConfigInvalid {
            section: STORAGE.to_string(),
            key: "pool_size".to_string(),
            reason: "pool_size must be at least 1".to_string(),
        });
    }

    Ok(StorageConfig {
        backend,
        path: PathBuf::from(path.trim()),
        pool_size: pool_size as u32,
    })
}

/// Names of all `[query.<name>]` sections, sorted.
pub fn query_names(config: &dyn ConfigPort) -> Vec<String> {
    config
        .sections()
        .into_iter()
        .filter_map(|s| s.strip_prefix(QUERY_PREFIX).map(str::to_string))
        .collect()
}

pub fn build_query(config: &dyn ConfigPort, name: &str) -> Result<Query, SnaptrackError> {
    let section = format!("{QUERY_PREFIX}{}", name.to_lowercase());
    if !config.sections().contains(&section) {
        return Err(SnaptrackError::ConfigMissing {
            section,
            key: "filter".to_string(),
        });
    }

    let mut query = match config
        .get_string(&section, "filter")
        .filter(|s| !s.trim().is_empty())
    {
        Some(text) => Query::filtered(predicate_parser::parse(&text)?),
        None => Query::all(),
    };

    if let Some(field) = config
        .get_string(&section, "sort")
        .filter(|s| !s.trim().is_empty())
    {
        let order = match config.get_string(&section, "order") {
            Some(s) => {
                SortOrder::from_str(&s).map_err(|reason| SnaptrackError::ConfigInvalid {
                    section: section.clone(),
                    key: "order".to_string(),
                    reason,
                })?
            }
            None => SortOrder::default(),
        };
        query = query.sorted_by(field.trim(), order);
    }

    if config.get_string(&section, "limit").is_some() {
        let limit = config.get_int(&section, "limit", 0);
        if limit < 1 {
            return Err(SnaptrackError::ConfigInvalid {
                section,
                key: "limit".to_string(),
                reason: "limit must be a positive integer".to_string(),
            });
        }
        query = query.limited(limit as usize);
    }

    Ok(query)
}

/// Resolve the selection query for a run: an explicit name, else the
/// configured default, else the full universe.
pub fn resolve_query(
    config: &dyn ConfigPort,
    analysis: &AnalysisConfig,
    name: Option<&str>,
) -> Result<(String, Query), SnaptrackError> {
    match name.map(str::to_string).or_else(|| analysis.default_query.clone()) {
        Some(name) => {
            let query = build_query(config, &name)?;
            Ok((name, query))
        }
        None => Ok(("all".to_string(), Query::all())),
    }
}

pub fn build_indicators(config: &dyn ConfigPort) -> Result<IndicatorSet, SnaptrackError> {
    let order = config
        .get_string(INDICATORS, "order")
        .ok_or_else(|| SnaptrackError::ConfigMissing {
            section: INDICATORS.to_string(),
            key: "order".to_string(),
        })?;
    let names = parse_order(&order).map_err(|e| SnaptrackError::ConfigInvalid {
        section: INDICATORS.to_string(),
        key: "order".to_string(),
        reason: e.to_string(),
    })?;

    let mut set = IndicatorSet::new();
    for name in names {
        let section = format!("{INDICATOR_PREFIX}{name}");
        let filter = config
            .get_string(&section, "filter")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SnaptrackError::ConfigMissing {
                section: section.clone(),
                key: "filter".to_string(),
            })?;
        let query = Query::filtered(predicate_parser::parse(&filter)?);
        let present = config
            .get_string(&section, "present")
            .unwrap_or_else(|| name.clone());
        let absent = config
            .get_string(&section, "absent")
            .unwrap_or_else(|| format!("not {name}"));
        let neutral = config.get_bool(&section, "neutral", false);
        set.push(name, query, present, absent, neutral)
            .map_err(|e| SnaptrackError::ConfigInvalid {
                section,
                key: "order".to_string(),
                reason: e.to_string(),
            })?;
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const CONFIG: &str = r#"
[analysis]
start_date = 2021-01-04
end_date = 2021-02-26
allocation_threshold = 15
cash_unit = 500
correlation_depth = 3
default_query = InLoss

[storage]
backend = sqlite
path = /tmp/snapshots.db

[indicators]
order = cheap, trend

[indicator.cheap]
filter = ABOVE(holders.avgCostToCurrentRatio, 1)
present = Trades below average holder cost
absent = Trades above average holder cost

[indicator.trend]
filter = ABOVE(trend.costTrend1Y, 0)
neutral = true

[query.inloss]
filter = BELOW(holders.profitableSharesRatio, 0.3)
sort = holders.profitableSharesRatio
order = asc
limit = 25

[query.everything]
filter =
"#;

    fn config() -> FileConfigAdapter {
        FileConfigAdapter::from_string(CONFIG).unwrap()
    }

    #[test]
    fn analysis_config_reads_values_and_defaults() {
        let analysis = build_analysis_config(&config()).unwrap();
        assert_eq!(analysis.start_date, NaiveDate::from_ymd_opt(2021, 1, 4).unwrap());
        assert_eq!(analysis.portfolio.allocation_threshold, 15.0);
        assert_eq!(analysis.portfolio.cash_unit, 500.0);
        assert_eq!(analysis.correlation_depth, 3);
        assert_eq!(analysis.max_lookback_days, 7);
        assert_eq!(analysis.default_query.as_deref(), Some("inloss"));
    }

    #[test]
    fn analysis_config_requires_dates() {
        let cfg = FileConfigAdapter::from_string("[analysis]\nstart_date = 2021-01-01\n").unwrap();
        let err = build_analysis_config(&cfg).unwrap_err();
        assert!(matches!(err, SnaptrackError::ConfigMissing { key, .. } if key == "end_date"));

        let cfg = FileConfigAdapter::from_string(
            "[analysis]\nstart_date = 01/01/2021\nend_date = 2021-02-01\n",
        )
        .unwrap();
        let err = build_analysis_config(&cfg).unwrap_err();
        assert!(matches!(err, SnaptrackError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn storage_config_parses_backend() {
        let storage = build_storage_config(&config()).unwrap();
        assert_eq!(storage.backend, StorageBackend::Sqlite);
        assert_eq!(storage.path, PathBuf::from("/tmp/snapshots.db"));
        assert_eq!(storage.pool_size, 4);

        let cfg = FileConfigAdapter::from_string("[storage]\nbackend = mongo\npath = x\n").unwrap();
        assert!(matches!(
            build_storage_config(&cfg),
            Err(SnaptrackError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn named_query_is_built() {
        let cfg = config();
        assert_eq!(query_names(&cfg), vec!["everything", "inloss"]);
        let query = build_query(&cfg, "InLoss").unwrap();
        assert!(query.filter.is_some());
        let sort = query.sort.unwrap();
        assert_eq!(sort.field, "holders.profitableSharesRatio");
        assert_eq!(sort.order, SortOrder::Ascending);
        assert_eq!(query.limit, Some(25));

        assert_eq!(build_query(&cfg, "everything").unwrap(), Query::all());
    }

    #[test]
    fn unknown_query_is_missing() {
        let err = build_query(&config(), "nope").unwrap_err();
        assert!(matches!(err, SnaptrackError::ConfigMissing { section, .. } if section == "query.nope"));
    }

    #[test]
    fn resolve_query_falls_back_to_default_then_all() {
        let cfg = config();
        let mut analysis = build_analysis_config(&cfg).unwrap();
        let (name, _) = resolve_query(&cfg, &analysis, None).unwrap();
        assert_eq!(name, "inloss");
        let (name, _) = resolve_query(&cfg, &analysis, Some("everything")).unwrap();
        assert_eq!(name, "everything");
        analysis.default_query = None;
        let (name, query) = resolve_query(&cfg, &analysis, None).unwrap();
        assert_eq!((name.as_str(), query), ("all", Query::all()));
    }

    #[test]
    fn indicators_follow_order_list() {
        let set = build_indicators(&config()).unwrap();
        assert_eq!(set.names(), vec!["cheap", "trend"]);
        let cheap = set.get("cheap").unwrap();
        assert_eq!(cheap.present, "Trades below average holder cost");
        assert!(!cheap.neutral);
        let trend = set.get("trend").unwrap();
        assert!(trend.neutral);
        assert_eq!(trend.present, "trend");
        assert_eq!(trend.absent, "not trend");
    }

    #[test]
    fn indicator_without_filter_is_missing() {
        let cfg = FileConfigAdapter::from_string("[indicators]\norder = ghost\n").unwrap();
        let err = build_indicators(&cfg).unwrap_err();
        assert!(
            matches!(err, SnaptrackError::ConfigMissing { section, .. } if section == "indicator.ghost")
        );
    }

    #[test]
    fn indicator_with_bad_predicate_fails_to_parse() {
        let cfg = FileConfigAdapter::from_string(
            "[indicators]\norder = bad\n[indicator.bad]\nfilter = ABOVE(price)\n",
        )
        .unwrap();
        assert!(matches!(
            build_indicators(&cfg),
            Err(SnaptrackError::PredicateParse(_))
        ));
    }
}
