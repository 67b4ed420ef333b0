//! Error types shared by every tabflow crate

use thiserror::Error;

/// Result type alias for tabflow operations
pub type Result<T> = std::result::Result<T, TabflowError>;

/// Main error type for tabflow
#[derive(Error, Debug)]
pub enum TabflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Schema mismatch: expected columns {expected:?}, got {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Failure categories reported by extraction and aggregation.
///
/// These show up in progress logs and failure summaries; the concrete
/// errors carry the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A row, line or element (or a whole document) could not be parsed
    ParseFailure,
    /// A source's output columns differ from the pipeline's target schema
    SchemaMismatch,
    /// A source could not be opened or fetched
    SourceUnavailable,
    /// Nothing usable was extracted from any source
    EmptyResult,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ParseFailure => "ParseFailure",
            ErrorKind::SchemaMismatch => "SchemaMismatch",
            ErrorKind::SourceUnavailable => "SourceUnavailable",
            ErrorKind::EmptyResult => "EmptyResult",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
