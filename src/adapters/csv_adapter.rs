//! CSV feature export.
//!
//! Feature columns are named after the indicators in declared order and
//! hold `1`/`0`.

use crate::domain::error::SnaptrackError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::report::{FeatureRow, HistoryRow};
use std::io::Write;
use std::path::Path;

pub struct CsvFeatureExporter<'a> {
    indicators: &'a IndicatorSet,
}

fn csv_error(e: csv::Error) -> SnaptrackError {
    SnaptrackError::Storage {
        reason: format!("CSV write error: {}", e),
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

impl<'a> CsvFeatureExporter<'a> {
    pub fn new(indicators: &'a IndicatorSet) -> Self {
        Self { indicators }
    }

    /// `ticker,name,<indicators...>`
    pub fn write_latest<W: Write>(
        &self,
        rows: &[FeatureRow],
        out: W,
    ) -> Result<(), SnaptrackError> {
        let mut writer = csv::Writer::from_writer(out);
        let mut header = vec!["ticker", "name"];
        header.extend(self.indicators.names());
        writer.write_record(&header).map_err(csv_error)?;

        for row in rows {
            let mut fields = vec![row.ticker.as_str(), row.name.as_str()];
            fields.extend(row.features.iter().map(|f| flag(*f)));
            writer.write_record(&fields).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// `<indicators...>,growth_percent`
    pub fn write_history<W: Write>(
        &self,
        rows: &[HistoryRow],
        out: W,
    ) -> Result<(), SnaptrackError> {
        let mut writer = csv::Writer::from_writer(out);
        let mut header = self.indicators.names();
        header.push("growth_percent");
        writer.write_record(&header).map_err(csv_error)?;

        for row in rows {
            let mut fields: Vec<String> =
                row.features.iter().map(|f| flag(*f).to_string()).collect();
            fields.push(row.growth_percent.to_string());
            writer.write_record(&fields).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_latest_file(
        &self,
        rows: &[FeatureRow],
        path: &Path,
    ) -> Result<(), SnaptrackError> {
        self.write_latest(rows, std::fs::File::create(path)?)
    }

    pub fn write_history_file(
        &self,
        rows: &[HistoryRow],
        path: &Path,
    ) -> Result<(), SnaptrackError> {
        self.write_history(rows, std::fs::File::create(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::Query;

    fn indicators() -> IndicatorSet {
        let mut set = IndicatorSet::new();
        set.push("cheap", Query::all(), "cheap", "not cheap", false)
            .unwrap();
        set.push("trend", Query::all(), "trend", "no trend", true)
            .unwrap();
        set
    }

    #[test]
    fn latest_rows_have_ticker_name_and_flags() {
        let set = indicators();
        let exporter = CsvFeatureExporter::new(&set);
        let rows = vec![FeatureRow {
            ticker: "AAPL".into(),
            name: "Apple, Inc".into(),
            features: vec![true, false],
        }];
        let mut out = Vec::new();
        exporter.write_latest(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "ticker,name,cheap,trend\nAAPL,\"Apple, Inc\",1,0\n");
    }

    #[test]
    fn history_rows_end_with_growth() {
        let set = indicators();
        let exporter = CsvFeatureExporter::new(&set);
        let rows = vec![
            HistoryRow {
                features: vec![false, true],
                growth_percent: -2.5,
            },
            HistoryRow {
                features: vec![true, true],
                growth_percent: 10.0,
            },
        ];
        let mut out = Vec::new();
        exporter.write_history(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "cheap,trend,growth_percent\n0,1,-2.5\n1,1,10\n");
    }

    #[test]
    fn writes_to_file() {
        let set = indicators();
        let exporter = CsvFeatureExporter::new(&set);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.csv");
        exporter.write_latest_file(&[], &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ticker,name,cheap,trend\n");
    }
}
