//! SQLite snapshot store.
//!
//! One row per (date, ticker) with the full record stored as JSON text.
//! Selection predicates run in Rust over the day's decoded rows.

use crate::domain::error::SnaptrackError;
use crate::domain::query::Query;
use crate::domain::record::EntityRecord;
use crate::ports::snapshot_port::SnapshotPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> SnaptrackError {
    SnaptrackError::Storage {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> SnaptrackError {
    SnaptrackError::StorageQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn open(path: &str, pool_size: u32) -> Result<Self, SnaptrackError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SnaptrackError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SnaptrackError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), SnaptrackError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS snapshots (
                    date TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    ticker TEXT NOT NULL,
                    record TEXT NOT NULL,
                    PRIMARY KEY (date, ticker)
                );
                CREATE INDEX IF NOT EXISTS idx_snapshots_date ON snapshots(date);",
            )
            .map_err(query_error)
    }

    /// Replace the snapshot of `date` with `records`, keeping their order.
    pub fn insert_records(
        &self,
        date: NaiveDate,
        records: &[EntityRecord],
    ) -> Result<usize, SnaptrackError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        let date_str = date.format(DATE_FORMAT).to_string();

        tx.execute("DELETE FROM snapshots WHERE date = ?1", params![date_str])
            .map_err(query_error)?;
        for (position, record) in records.iter().enumerate() {
            let body = serde_json::to_string(record)?;
            tx.execute(
                "INSERT OR REPLACE INTO snapshots (date, position, ticker, record)
                 VALUES (?1, ?2, ?3, ?4)",
                params![date_str, position as i64, record.ticker, body],
            )
            .map_err(query_error)?;
        }
        tx.commit().map_err(query_error)?;
        Ok(records.len())
    }

    fn day_records(&self, date: NaiveDate) -> Result<Vec<EntityRecord>, SnaptrackError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT record FROM snapshots WHERE date = ?1 ORDER BY position ASC")
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(query_error)?;

        let mut records = Vec::new();
        for row in rows {
            let body = row.map_err(query_error)?;
            records.push(serde_json::from_str(&body)?);
        }
        Ok(records)
    }
}

impl SnapshotPort for SqliteAdapter {
    fn snapshot_exists(&self, date: NaiveDate) -> Result<bool, SnaptrackError> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM snapshots WHERE date = ?1",
                params![date.format(DATE_FORMAT).to_string()],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        Ok(count > 0)
    }

    fn select(&self, date: NaiveDate, query: &Query) -> Result<Vec<EntityRecord>, SnaptrackError> {
        let records = self.day_records(date)?;
        if records.is_empty() {
            return Err(SnaptrackError::NoSnapshot { date });
        }
        Ok(query.apply(records))
    }

    fn lookup(
        &self,
        date: NaiveDate,
        ticker: &str,
    ) -> Result<Option<EntityRecord>, SnaptrackError> {
        let body: Option<String> = self
            .conn()?
            .query_row(
                "SELECT record FROM snapshots WHERE date = ?1 AND ticker = ?2",
                params![date.format(DATE_FORMAT).to_string(), ticker],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)?;
        body.map(|b| serde_json::from_str(&b).map_err(SnaptrackError::from))
            .transpose()
    }

    fn available_dates(&self) -> Result<Vec<NaiveDate>, SnaptrackError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT date FROM snapshots ORDER BY date ASC")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_error)?;

        let mut dates = Vec::new();
        for row in rows {
            let text = row.map_err(query_error)?;
            let date = NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
                SnaptrackError::StorageQuery {
                    reason: format!("invalid stored date {text}: {e}"),
                }
            })?;
            dates.push(date);
        }
        Ok(dates)
    }
}
