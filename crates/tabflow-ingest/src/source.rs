//! Source descriptors and per-format extraction settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a source's raw content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Url(String),
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::File(path) => write!(f, "{}", path.display()),
            SourceLocation::Url(url) => f.write_str(url),
        }
    }
}

/// Declared format of a source, with the settings its extractor needs.
///
/// The set is closed: adding a format means adding a variant and handling it
/// in [`crate::extract::extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum SourceFormat {
    HtmlTable(HtmlTableSpec),
    Csv(CsvSpec),
    Json(JsonSpec),
    Xml(XmlSpec),
}

impl SourceFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::HtmlTable(_) => "html_table",
            SourceFormat::Csv(_) => "csv",
            SourceFormat::Json(_) => "json",
            SourceFormat::Xml(_) => "xml",
        }
    }
}

/// One input to a pipeline run. Consumed once by the matching extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub id: String,
    pub location: SourceLocation,
    pub format: SourceFormat,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, location: SourceLocation, format: SourceFormat) -> Self {
        Self {
            id: id.into(),
            location,
            format,
        }
    }

    pub fn file(path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        let path = path.into();
        Self::new(path.display().to_string(), SourceLocation::File(path), format)
    }

    pub fn url(url: impl Into<String>, format: SourceFormat) -> Self {
        let url = url.into();
        Self::new(url.clone(), SourceLocation::Url(url), format)
    }
}

// ============================================================================
// Format Settings
// ============================================================================

/// Which table to read from a page and how its cells map to columns.
///
/// Pages embed several tables; the target is picked by position among the
/// page's `<tbody>` elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlTableSpec {
    #[serde(default)]
    pub table_index: usize,

    pub cells: Vec<CellMapping>,

    /// Stop after this many rows have been emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<usize>,
}

impl HtmlTableSpec {
    pub fn new(table_index: usize, cells: Vec<CellMapping>) -> Self {
        Self {
            table_index,
            cells,
            row_limit: None,
        }
    }

    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    /// Rows with fewer `<td>` cells than this are header or separator rows.
    pub fn min_cells(&self) -> usize {
        self.cells.iter().map(|c| c.index + 1).max().unwrap_or(0)
    }
}

/// `<td>` position → output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMapping {
    pub index: usize,
    pub column: String,
    #[serde(default)]
    pub kind: CellKind,
}

impl CellMapping {
    pub fn text(index: usize, column: impl Into<String>) -> Self {
        Self {
            index,
            column: column.into(),
            kind: CellKind::Text,
        }
    }

    pub fn number(index: usize, column: impl Into<String>) -> Self {
        Self {
            index,
            column: column.into(),
            kind: CellKind::Number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    #[default]
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CsvSpec {
    /// Columns parsed as numbers; a row that fails to parse is dropped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numeric_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JsonSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numeric_columns: Vec<String>,
}

/// Repeated row element under the document root and the sub-elements to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XmlSpec {
    #[serde(default = "default_record_tag")]
    pub record_tag: String,

    pub columns: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numeric_columns: Vec<String>,
}

impl XmlSpec {
    pub fn new<I, S>(record_tag: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            record_tag: record_tag.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            numeric_columns: Vec::new(),
        }
    }
}

fn default_record_tag() -> String {
    "record".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_min_cells_follows_highest_index() {
        let spec = HtmlTableSpec::new(
            0,
            vec![CellMapping::text(1, "Name"), CellMapping::number(2, "MC_USD_Billion")],
        );
        assert_eq!(spec.min_cells(), 3);
    }

    #[test]
    fn test_format_tag_deserializes() {
        let format: SourceFormat = toml::from_str(
            r#"
            format = "xml"
            columns = ["car_model", "price"]
            "#,
        )
        .unwrap();

        match format {
            SourceFormat::Xml(spec) => {
                assert_eq!(spec.record_tag, "record");
                assert_eq!(spec.columns, vec!["car_model", "price"]);
            },
            other => panic!("unexpected format {:?}", other),
        }
    }
}
