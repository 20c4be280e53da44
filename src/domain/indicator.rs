//! Ordered indicator registry.
//!
//! Indicators are named selection queries with human-readable descriptions.
//! Declaration order fixes both the rating weight and the feature column
//! order: the first indicator carries the highest bit of a rating.

use std::collections::HashSet;

use super::query::Query;

/// Ratings are `u64` bit sets, one bit per indicator.
pub const MAX_INDICATORS: usize = 63;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorDefinition {
    pub name: String,
    pub query: Query,
    pub rank: usize,
    /// Shown when the indicator holds.
    pub present: String,
    /// Shown when it does not.
    pub absent: String,
    /// Unsatisfied neutral indicators are reported as neutrals, not minuses.
    pub neutral: bool,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum IndicatorError {
    #[error("empty indicator name in order list")]
    EmptyName,

    #[error("duplicate indicator: {0}")]
    DuplicateName(String),

    #[error("too many indicators: {count} (maximum {max})", max = MAX_INDICATORS)]
    TooMany { count: usize },

    #[error("no indicators declared")]
    Empty,
}

/// Parse a comma-separated indicator order list. Names are compared
/// case-insensitively and returned lowercased.
pub fn parse_order(input: &str) -> Result<Vec<String>, IndicatorError> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(IndicatorError::EmptyName);
        }
        let name = trimmed.to_lowercase();
        if !seen.insert(name.clone()) {
            return Err(IndicatorError::DuplicateName(name));
        }
        names.push(name);
    }

    if names.len() > MAX_INDICATORS {
        return Err(IndicatorError::TooMany { count: names.len() });
    }
    Ok(names)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    definitions: Vec<IndicatorDefinition>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an indicator; its rank is its position in the set.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        query: Query,
        present: impl Into<String>,
        absent: impl Into<String>,
        neutral: bool,
    ) -> Result<(), IndicatorError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IndicatorError::EmptyName);
        }
        if self.get(&name).is_some() {
            return Err(IndicatorError::DuplicateName(name));
        }
        if self.definitions.len() == MAX_INDICATORS {
            return Err(IndicatorError::TooMany {
                count: MAX_INDICATORS + 1,
            });
        }
        let rank = self.definitions.len();
        self.definitions.push(IndicatorDefinition {
            name,
            query,
            rank,
            present: present.into(),
            absent: absent.into(),
            neutral,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorDefinition> {
        self.definitions.iter()
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    /// Rating weight of the indicator at `rank`: `2^(N-1-rank)`.
    pub fn weight(&self, rank: usize) -> u64 {
        1u64 << (self.definitions.len() - 1 - rank)
    }

    /// Whether the indicator at `rank` is set in a rating mask.
    pub fn is_set(&self, mask: u64, rank: usize) -> bool {
        mask & self.weight(rank) != 0
    }

    /// Indicators set in `mask`, in declared order.
    pub fn satisfied(&self, mask: u64) -> impl Iterator<Item = &IndicatorDefinition> {
        self.definitions
            .iter()
            .filter(move |d| self.is_set(mask, d.rank))
    }

    /// One boolean per declared indicator.
    pub fn features(&self, mask: u64) -> Vec<bool> {
        self.definitions
            .iter()
            .map(|d| self.is_set(mask, d.rank))
            .collect()
    }

    /// Human-readable name of an indicator combination.
    pub fn describe(&self, mask: u64) -> String {
        self.satisfied(mask)
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}
