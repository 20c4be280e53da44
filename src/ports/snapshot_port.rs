//! Snapshot access port trait.
//!
//! A snapshot store answers per-date questions about the tracked universe.
//! A date without data is signalled by `snapshot_exists` returning `false`,
//! or by `select` failing with [`SnaptrackError::NoSnapshot`].

use crate::domain::error::SnaptrackError;
use crate::domain::query::Query;
use crate::domain::record::EntityRecord;
use chrono::NaiveDate;

pub trait SnapshotPort {
    fn snapshot_exists(&self, date: NaiveDate) -> Result<bool, SnaptrackError>;

    /// Records of `date` selected by `query`, in query order.
    fn select(&self, date: NaiveDate, query: &Query) -> Result<Vec<EntityRecord>, SnaptrackError>;

    /// Direct lookup of one ticker, bypassing any selection filter.
    fn lookup(&self, date: NaiveDate, ticker: &str)
    -> Result<Option<EntityRecord>, SnaptrackError>;

    /// All dates with data, ascending.
    fn available_dates(&self) -> Result<Vec<NaiveDate>, SnaptrackError>;
}
