//! Port traits separating the domain from storage, configuration and output.

pub mod config_port;
pub mod prediction_port;
pub mod report_port;
pub mod snapshot_port;
