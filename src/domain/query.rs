//! Selection queries: filter predicate, sort key and limit.

use crate::domain::error::ParseError;
use crate::domain::predicate::Predicate;
use crate::domain::predicate_eval::evaluate;
use crate::domain::predicate_parser;
use crate::domain::record::{EntityRecord, FieldSource};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("expected asc or desc, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub filter: Option<Predicate>,
    pub sort: Option<SortKey>,
    pub limit: Option<usize>,
}

impl Query {
    /// The unfiltered full-universe query.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Predicate) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    /// Parse a filter expression into a query with no sort or limit.
    pub fn parse_filter(text: &str) -> Result<Self, ParseError> {
        Ok(Self::filtered(predicate_parser::parse(text)?))
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortKey {
            field: field.into(),
            order,
        });
        self
    }

    pub fn limited(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &EntityRecord) -> bool {
        self.filter.as_ref().is_none_or(|p| evaluate(p, record))
    }

    /// Filter, sort and truncate one day's records.
    ///
    /// With a sort key set, records lacking a numeric value at the sort path
    /// are dropped. The sort is stable so equal keys keep snapshot order.
    pub fn apply(&self, records: impl IntoIterator<Item = EntityRecord>) -> Vec<EntityRecord> {
        let mut selected: Vec<EntityRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(sort) = &self.sort {
            let mut keyed: Vec<(f64, EntityRecord)> = selected
                .into_iter()
                .filter_map(|r| r.number(&sort.field).map(|k| (k, r)))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| match sort.order {
                SortOrder::Ascending => a.total_cmp(b),
                SortOrder::Descending => b.total_cmp(a),
            });
            selected = keyed.into_iter().map(|(_, r)| r).collect();
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(p) => write!(f, "{p}")?,
            None => write!(f, "ALL")?,
        }
        if let Some(sort) = &self.sort {
            let order = match sort.order {
                SortOrder::Ascending => "asc",
                SortOrder::Descending => "desc",
            };
            write!(f, " sort {} {}", sort.field, order)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {limit}")?;
        }
        Ok(())
    }
}
