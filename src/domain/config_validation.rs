//! Configuration validation.
//!
//! Validates all config fields before any run. Predicates are not parsed
//! here; that happens when queries and indicators are built.

use crate::domain::analysis::{
    ANALYSIS, INDICATOR_PREFIX, INDICATORS, QUERY_PREFIX, STORAGE, StorageBackend, parse_date,
};
use crate::domain::correlation::MAX_DEPTH;
use crate::domain::error::SnaptrackError;
use crate::domain::indicator::parse_order;
use crate::domain::query::SortOrder;
use crate::ports::config_port::ConfigPort;

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    validate_dates(config)?;
    validate_allocation(config)?;
    validate_correlation_depth(config)?;
    validate_lookback(config)?;
    validate_default_query(config)?;
    Ok(())
}

pub fn validate_storage_config(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    validate_backend(config)?;
    validate_storage_path(config)?;
    validate_pool_size(config)?;
    Ok(())
}

pub fn validate_indicator_config(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    let order = match config.get_string(INDICATORS, "order") {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return Err(SnaptrackError::ConfigMissing {
                section: INDICATORS.to_string(),
                key: "order".to_string(),
            });
        }
    };
    let names = parse_order(&order).map_err(|e| invalid(INDICATORS, "order", e.to_string()))?;
    for name in names {
        let section = format!("{INDICATOR_PREFIX}{name}");
        match config.get_string(&section, "filter") {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(SnaptrackError::ConfigMissing {
                    section,
                    key: "filter".to_string(),
                });
            }
        }
    }
    Ok(())
}

pub fn validate_query_config(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    for section in config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(QUERY_PREFIX))
    {
        if let Some(order) = config.get_string(&section, "order") {
            order
                .parse::<SortOrder>()
                .map_err(|reason| invalid(&section, "order", reason))?;
        }
        if config.get_string(&section, "limit").is_some()
            && config.get_int(&section, "limit", 0) < 1
        {
            return Err(invalid(
                &section,
                "limit",
                "limit must be a positive integer".to_string(),
            ));
        }
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> SnaptrackError {
    SnaptrackError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    let start_str = config.get_string(ANALYSIS, "start_date");
    let end_str = config.get_string(ANALYSIS, "end_date");

    let start_date = parse_date(start_str.as_deref(), ANALYSIS, "start_date")?;
    let end_date = parse_date(end_str.as_deref(), ANALYSIS, "end_date")?;

    if start_date > end_date {
        return Err(invalid(
            ANALYSIS,
            "start_date",
            "start_date must not be after end_date".to_string(),
        ));
    }
    Ok(())
}

fn validate_allocation(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    let threshold = config.get_double(ANALYSIS, "allocation_threshold", 10.0);
    if threshold <= 0.0 {
        return Err(invalid(
            ANALYSIS,
            "allocation_threshold",
            "allocation_threshold must be positive".to_string(),
        ));
    }
    let cash_unit = config.get_double(ANALYSIS, "cash_unit", 1000.0);
    if cash_unit <= 0.0 {
        return Err(invalid(
            ANALYSIS,
            "cash_unit",
            "cash_unit must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_correlation_depth(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    let depth = config.get_int(ANALYSIS, "correlation_depth", 2);
    if depth < 1 || depth > MAX_DEPTH as i64 {
        return Err(invalid(
            ANALYSIS,
            "correlation_depth",
            format!("correlation_depth must be between 1 and {MAX_DEPTH}"),
        ));
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    let value = config.get_int(ANALYSIS, "max_lookback_days", 7);
    if !(0..=366).contains(&value) {
        return Err(invalid(
            ANALYSIS,
            "max_lookback_days",
            "max_lookback_days must be between 0 and 366".to_string(),
        ));
    }
    Ok(())
}

fn validate_default_query(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    let Some(name) = config
        .get_string(ANALYSIS, "default_query")
        .filter(|s| !s.trim().is_empty())
    else {
        return Ok(());
    };
    let section = format!("{QUERY_PREFIX}{}", name.trim().to_lowercase());
    if !config.sections().contains(&section) {
        return Err(invalid(
            ANALYSIS,
            "default_query",
            format!("no [{section}] section"),
        ));
    }
    Ok(())
}

fn validate_backend(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    let Some(value) = config.get_string(STORAGE, "backend") else {
        return Ok(());
    };
    let backend = value
        .parse::<StorageBackend>()
        .map_err(|reason| invalid(STORAGE, "backend", reason))?;
    if backend == StorageBackend::Sqlite && !cfg!(feature = "sqlite") {
        return Err(invalid(
            STORAGE,
            "backend",
            "sqlite backend requires the sqlite feature".to_string(),
        ));
    }
    Ok(())
}

fn validate_storage_path(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    match config.get_string(STORAGE, "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(SnaptrackError::ConfigMissing {
            section: STORAGE.to_string(),
            key: "path".to_string(),
        }),
    }
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), SnaptrackError> {
    let value = config.get_int(STORAGE, "pool_size", 4);
    if value < 1 {
        return Err(invalid(
            STORAGE,
            "pool_size",
            "pool_size must be at least 1".to_string(),
        ));
    }
    Ok(())
}
