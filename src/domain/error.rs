//! Domain error types.

use chrono::NaiveDate;

/// A parse error with position information for predicate parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for snaptrack.
#[derive(Debug, thiserror::Error)]
pub enum SnaptrackError {
    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("storage query error: {reason}")]
    StorageQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    PredicateParse(#[from] ParseError),

    #[error("no snapshot for {date}")]
    NoSnapshot { date: NaiveDate },

    #[error("internal invariant violated: {reason}")]
    Invariant { reason: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SnaptrackError {
    pub fn is_no_snapshot(&self) -> bool {
        matches!(self, SnaptrackError::NoSnapshot { .. })
    }
}

impl From<&SnaptrackError> for std::process::ExitCode {
    fn from(err: &SnaptrackError) -> Self {
        let code: u8 = match err {
            SnaptrackError::Io(_) | SnaptrackError::Serialization(_) => 1,
            SnaptrackError::ConfigParse { .. }
            | SnaptrackError::ConfigMissing { .. }
            | SnaptrackError::ConfigInvalid { .. } => 2,
            SnaptrackError::Storage { .. } | SnaptrackError::StorageQuery { .. } => 3,
            SnaptrackError::PredicateParse(_) => 4,
            SnaptrackError::NoSnapshot { .. } => 5,
            SnaptrackError::Invariant { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
