//! JSON report adapter implementing ReportPort.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::correlation::CorrelationReport;
use crate::domain::error::SnaptrackError;
use crate::domain::report::{RunReport, TickerReport};
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        output_path: &str,
    ) -> Result<(), SnaptrackError> {
        let body = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        if let Some(parent) = Path::new(output_path).parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, body)?;
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_run(&self, report: &RunReport<'_>, output_path: &str) -> Result<(), SnaptrackError> {
        self.write_json(report, output_path)
    }

    /// Reports keyed by ticker.
    fn write_ticker_reports(
        &self,
        reports: &[TickerReport],
        output_path: &str,
    ) -> Result<(), SnaptrackError> {
        let keyed: BTreeMap<&str, &TickerReport> =
            reports.iter().map(|r| (r.ticker.as_str(), r)).collect();
        self.write_json(&keyed, output_path)
    }

    fn write_correlation(
        &self,
        report: &CorrelationReport,
        output_path: &str,
    ) -> Result<(), SnaptrackError> {
        self.write_json(report, output_path)
    }
}
