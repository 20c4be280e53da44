//! Daily entity records and attribute access.
//!
//! An [`EntityRecord`] carries a fixed core (ticker, price, display name) plus
//! an open map of provider attributes addressed by dotted paths such as
//! `holders.profitableSharesRatio`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashSet;

use super::error::SnaptrackError;

/// Anything a predicate can read fields from.
pub trait FieldSource {
    /// Resolve a dotted path. Null values are reported as absent.
    fn value(&self, path: &str) -> Option<Cow<'_, Value>>;

    fn number(&self, path: &str) -> Option<f64> {
        self.value(path).and_then(|v| v.as_f64())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub ticker: String,
    #[serde(default, alias = "currentCost", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl EntityRecord {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            price: None,
            name: None,
            attributes: Map::new(),
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

impl FieldSource for EntityRecord {
    fn value(&self, path: &str) -> Option<Cow<'_, Value>> {
        match path {
            "ticker" => Some(Cow::Owned(Value::String(self.ticker.clone()))),
            "price" => self
                .price
                .and_then(serde_json::Number::from_f64)
                .map(|n| Cow::Owned(Value::Number(n))),
            "name" => self
                .name
                .as_ref()
                .map(|n| Cow::Owned(Value::String(n.clone()))),
            _ => lookup_in_map(&self.attributes, path).map(Cow::Borrowed),
        }
    }
}

impl FieldSource for Value {
    fn value(&self, path: &str) -> Option<Cow<'_, Value>> {
        match self {
            Value::Object(map) => lookup_in_map(map, path).map(Cow::Borrowed),
            _ => None,
        }
    }
}

fn lookup_in_map<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = map.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(inner) => inner.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() { None } else { Some(current) }
}

/// Ticker keys of a snapshot.
pub fn membership(records: &[EntityRecord]) -> HashSet<&str> {
    records.iter().map(|r| r.ticker.as_str()).collect()
}

/// Reject a snapshot that lists the same ticker twice.
pub fn check_unique(date: NaiveDate, records: &[EntityRecord]) -> Result<(), SnaptrackError> {
    let mut seen = HashSet::with_capacity(records.len());
    for r in records {
        if !seen.insert(r.ticker.as_str()) {
            return Err(SnaptrackError::Invariant {
                reason: format!("ticker {} appears twice in the {date} snapshot", r.ticker),
            });
        }
    }
    Ok(())
}
