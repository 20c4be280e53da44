//! JSON snapshot directory adapter.
//!
//! Each day lives in `<base>/tickers_YYYY_MM_DD.json` as an array of entity
//! records. Parsed days are kept in a [`SnapshotCache`] owned by the caller,
//! so repeated `select`/`lookup` calls for one date read the file once.

use crate::domain::error::SnaptrackError;
use crate::domain::query::Query;
use crate::domain::record::EntityRecord;
use crate::ports::snapshot_port::SnapshotPort;
use chrono::NaiveDate;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const FILE_FORMAT: &str = "tickers_%Y_%m_%d.json";

/// Per-run memo of parsed daily files.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    days: RefCell<HashMap<NaiveDate, Rc<Vec<EntityRecord>>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, date: NaiveDate) -> Option<Rc<Vec<EntityRecord>>> {
        self.days.borrow().get(&date).cloned()
    }

    fn insert(&self, date: NaiveDate, records: Vec<EntityRecord>) -> Rc<Vec<EntityRecord>> {
        let records = Rc::new(records);
        self.days.borrow_mut().insert(date, Rc::clone(&records));
        records
    }

    pub fn len(&self) -> usize {
        self.days.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.borrow().is_empty()
    }
}

pub struct JsonSnapshotAdapter<'c> {
    base_path: PathBuf,
    cache: &'c SnapshotCache,
}

impl<'c> JsonSnapshotAdapter<'c> {
    pub fn new(base_path: impl Into<PathBuf>, cache: &'c SnapshotCache) -> Self {
        Self {
            base_path: base_path.into(),
            cache,
        }
    }

    pub fn file_name(date: NaiveDate) -> String {
        date.format(FILE_FORMAT).to_string()
    }

    fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.base_path.join(Self::file_name(date))
    }

    /// Parsed records of `date`, or `None` when the day has no file.
    fn load(&self, date: NaiveDate) -> Result<Option<Rc<Vec<EntityRecord>>>, SnaptrackError> {
        if let Some(records) = self.cache.get(date) {
            debug!("{date}: snapshot cache hit");
            return Ok(Some(records));
        }
        let path = self.snapshot_path(date);
        if !path.is_file() {
            return Ok(None);
        }
        let records = read_snapshot_file(&path)?;
        debug!("{date}: loaded {} records from {}", records.len(), path.display());
        Ok(Some(self.cache.insert(date, records)))
    }

    fn load_required(&self, date: NaiveDate) -> Result<Rc<Vec<EntityRecord>>, SnaptrackError> {
        self.load(date)?.ok_or(SnaptrackError::NoSnapshot { date })
    }
}

/// Parse one snapshot file into records.
pub fn read_snapshot_file(path: &Path) -> Result<Vec<EntityRecord>, SnaptrackError> {
    let content = fs::read_to_string(path).map_err(|e| SnaptrackError::Storage {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    serde_json::from_str(&content).map_err(|e| SnaptrackError::StorageQuery {
        reason: format!("invalid snapshot {}: {}", path.display(), e),
    })
}

impl SnapshotPort for JsonSnapshotAdapter<'_> {
    fn snapshot_exists(&self, date: NaiveDate) -> Result<bool, SnaptrackError> {
        Ok(self.cache.get(date).is_some() || self.snapshot_path(date).is_file())
    }

    fn select(&self, date: NaiveDate, query: &Query) -> Result<Vec<EntityRecord>, SnaptrackError> {
        let records = self.load_required(date)?;
        Ok(query.apply(records.iter().cloned()))
    }

    fn lookup(
        &self,
        date: NaiveDate,
        ticker: &str,
    ) -> Result<Option<EntityRecord>, SnaptrackError> {
        Ok(self
            .load(date)?
            .and_then(|records| records.iter().find(|r| r.ticker == ticker).cloned()))
    }

    fn available_dates(&self) -> Result<Vec<NaiveDate>, SnaptrackError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SnaptrackError::Storage {
            reason: format!("failed to list {}: {}", self.base_path.display(), e),
        })?;
        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(date) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, FILE_FORMAT).ok())
            {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::SortOrder;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
    }

    fn write_day(dir: &Path, d: u32, body: &str) {
        fs::write(dir.join(JsonSnapshotAdapter::file_name(date(d))), body).unwrap();
    }

    const DAY: &str = r#"[
        {"ticker": "AAPL", "currentCost": 120.5, "name": "Apple", "holders": {"ratio": 0.4}},
        {"ticker": "MSFT", "price": 230.0, "holders": {"ratio": 0.9}},
        {"ticker": "ZM"}
    ]"#;

    #[test]
    fn file_name_uses_underscored_date() {
        assert_eq!(JsonSnapshotAdapter::file_name(date(5)), "tickers_2021_03_05.json");
    }

    #[test]
    fn select_applies_query_and_reports_missing_days() {
        let dir = tempfile::tempdir().unwrap();
        write_day(dir.path(), 1, DAY);
        let cache = SnapshotCache::new();
        let adapter = JsonSnapshotAdapter::new(dir.path(), &cache);

        let query = Query::parse_filter("ABOVE(holders.ratio, 0.5)").unwrap();
        let selected = adapter.select(date(1), &query).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].ticker, "MSFT");

        let sorted = adapter
            .select(date(1), &Query::all().sorted_by("price", SortOrder::Ascending))
            .unwrap();
        let order: Vec<&str> = sorted.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, vec!["AAPL", "MSFT"]);

        let err = adapter.select(date(2), &Query::all()).unwrap_err();
        assert!(err.is_no_snapshot());
    }

    #[test]
    fn days_are_read_once() {
        let dir = tempfile::tempdir().unwrap();
        write_day(dir.path(), 1, DAY);
        let cache = SnapshotCache::new();
        let adapter = JsonSnapshotAdapter::new(dir.path(), &cache);

        assert_eq!(adapter.select(date(1), &Query::all()).unwrap().len(), 3);
        fs::remove_file(dir.path().join(JsonSnapshotAdapter::file_name(date(1)))).unwrap();
        assert!(adapter.snapshot_exists(date(1)).unwrap());
        assert_eq!(adapter.select(date(1), &Query::all()).unwrap().len(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lookup_finds_ticker_or_none() {
        let dir = tempfile::tempdir().unwrap();
        write_day(dir.path(), 1, DAY);
        let cache = SnapshotCache::new();
        let adapter = JsonSnapshotAdapter::new(dir.path(), &cache);

        let apple = adapter.lookup(date(1), "AAPL").unwrap().unwrap();
        assert_eq!(apple.price, Some(120.5));
        assert_eq!(apple.name.as_deref(), Some("Apple"));
        assert!(adapter.lookup(date(1), "GOOG").unwrap().is_none());
        assert!(adapter.lookup(date(9), "AAPL").unwrap().is_none());
    }

    #[test]
    fn available_dates_are_sorted_and_ignore_other_files() {
        let dir = tempfile::tempdir().unwrap();
        write_day(dir.path(), 7, "[]");
        write_day(dir.path(), 2, "[]");
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let cache = SnapshotCache::new();
        let adapter = JsonSnapshotAdapter::new(dir.path(), &cache);

        assert_eq!(adapter.available_dates().unwrap(), vec![date(2), date(7)]);
        assert!(!adapter.snapshot_exists(date(3)).unwrap());
    }

    #[test]
    fn malformed_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        write_day(dir.path(), 1, "{ not json");
        let cache = SnapshotCache::new();
        let adapter = JsonSnapshotAdapter::new(dir.path(), &cache);

        let err = adapter.select(date(1), &Query::all()).unwrap_err();
        assert!(matches!(err, SnaptrackError::StorageQuery { .. }));
    }

    #[test]
    fn missing_directory_is_a_storage_error() {
        let cache = SnapshotCache::new();
        let adapter = JsonSnapshotAdapter::new("/nonexistent/snaptrack", &cache);
        assert!(matches!(
            adapter.available_dates().unwrap_err(),
            SnaptrackError::Storage { .. }
        ));
    }
}
