//! Format extractors
//!
//! Each extractor is a pure function from a source's raw text to an
//! [`Extracted`] record set. Row-level problems never fail the source: the row
//! is dropped and described by a [`RowIssue`] so the caller can log it.
//! Document-level problems (unparseable JSON array, malformed XML, missing
//! table) fail the whole source with an [`ExtractError`].

pub mod csv;
pub mod html;
pub mod json;
pub mod xml;

use tabflow_common::types::{Record, RecordSet, Value};
use tabflow_common::{ErrorKind, TabflowError};

use crate::source::SourceFormat;

/// Rows extracted from one source plus the rows that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub records: RecordSet,
    pub issues: Vec<RowIssue>,
}

impl Extracted {
    pub fn new(records: RecordSet) -> Self {
        Self {
            records,
            issues: Vec::new(),
        }
    }
}

/// A dropped row, with enough context to diagnose it without rerunning.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    /// Zero-based position of the row within its source, or within the
    /// aggregated set for issues raised by a transform
    pub row: usize,
    pub column: Option<String>,
    pub raw: String,
    pub reason: String,
}

impl RowIssue {
    pub fn new(row: usize, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row,
            column: None,
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Row issues are always parse failures.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ParseFailure
    }
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.row, self.reason)?;
        if let Some(column) = &self.column {
            write!(f, " (column {}", column)?;
            write!(f, ", raw value {:?})", self.raw)
        } else {
            write!(f, " (raw {:?})", self.raw)
        }
    }
}

/// Source-level extraction failure
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("table index {index} not found: page has {available} table bodies")]
    TableNotFound { index: usize, available: usize },

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("CSV input has no header row")]
    MissingHeader,

    #[error("invalid CSV: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("invalid extraction settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Model(#[from] TabflowError),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Model(TabflowError::SchemaMismatch { .. }) => ErrorKind::SchemaMismatch,
            _ => ErrorKind::ParseFailure,
        }
    }
}

impl From<quick_xml::Error> for ExtractError {
    fn from(err: quick_xml::Error) -> Self {
        ExtractError::Xml(err.to_string())
    }
}

/// Run the extractor matching the declared format.
pub fn extract(format: &SourceFormat, content: &str) -> Result<Extracted, ExtractError> {
    match format {
        SourceFormat::HtmlTable(spec) => html::extract(content, spec),
        SourceFormat::Csv(spec) => csv::extract(content, spec),
        SourceFormat::Json(spec) => json::extract(content, spec),
        SourceFormat::Xml(spec) => xml::extract(content, spec),
    }
}

/// Convert the declared numeric columns of a row in place.
///
/// `Absent` cells stay absent; text that does not parse fails the row.
pub(crate) fn coerce_numeric(
    record: &mut Record,
    numeric_columns: &[String],
    row: usize,
) -> Result<(), RowIssue> {
    for column in numeric_columns {
        let Some(Value::Text(raw)) = record.get(column) else {
            continue;
        };
        match Value::parse_number(raw) {
            Some(n) => record.set(column.as_str(), n),
            None => {
                let issue = RowIssue::new(row, raw.clone(), "value is not numeric");
                return Err(issue.in_column(column));
            },
        }
    }
    Ok(())
}
