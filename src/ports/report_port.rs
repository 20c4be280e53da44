//! Report output port trait.

use crate::domain::correlation::CorrelationReport;
use crate::domain::error::SnaptrackError;
use crate::domain::report::{RunReport, TickerReport};

/// Port for writing analysis reports.
pub trait ReportPort {
    fn write_run(&self, report: &RunReport<'_>, output_path: &str) -> Result<(), SnaptrackError>;

    fn write_ticker_reports(
        &self,
        reports: &[TickerReport],
        output_path: &str,
    ) -> Result<(), SnaptrackError>;

    fn write_correlation(
        &self,
        report: &CorrelationReport,
        output_path: &str,
    ) -> Result<(), SnaptrackError>;
}
