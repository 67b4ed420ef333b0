//! HTML table extraction
//!
//! Reads one `<tbody>` of a scraped page. Cell positions are mapped to
//! columns per call; see [`HtmlTableSpec`].

use scraper::{ElementRef, Html, Selector};
use tabflow_common::types::{Record, RecordSet, Value};
use tracing::debug;

use super::{ExtractError, Extracted, RowIssue};
use crate::source::{CellKind, HtmlTableSpec};

/// Extract the configured table from page markup.
///
/// Rows with fewer `<td>` cells than the mapping needs are skipped without an
/// issue; they are headers or separators. A numeric cell that does not parse
/// drops its row. When `row_limit` is set, iteration stops as soon as that many
/// rows have been emitted.
pub fn extract(markup: &str, spec: &HtmlTableSpec) -> Result<Extracted, ExtractError> {
    if spec.cells.is_empty() {
        return Err(ExtractError::Settings(
            "HTML table mapping has no cells".to_string(),
        ));
    }

    let mut records = RecordSet::empty(spec.cells.iter().map(|c| c.column.as_str()))?;
    let mut issues = Vec::new();

    let document = Html::parse_document(markup);
    let tbody = Selector::parse("tbody").map_err(|e| ExtractError::Selector(e.to_string()))?;

    let Some(table) = document.select(&tbody).nth(spec.table_index) else {
        return Err(ExtractError::TableNotFound {
            index: spec.table_index,
            available: document.select(&tbody).count(),
        });
    };

    let min_cells = spec.min_cells();

    for (row_index, row) in child_elements(table, "tr").enumerate() {
        if spec.row_limit.is_some_and(|limit| records.len() >= limit) {
            debug!(limit = records.len(), "Row limit reached");
            break;
        }

        let cells: Vec<String> = child_elements(row, "td").map(cell_text).collect();
        if cells.len() < min_cells {
            debug!(row = row_index, cells = cells.len(), "Skipping short row");
            continue;
        }

        match build_row(&cells, spec, row_index) {
            Ok(record) => records.append(record)?,
            Err(issue) => issues.push(issue),
        }
    }

    Ok(Extracted { records, issues })
}

fn build_row(cells: &[String], spec: &HtmlTableSpec, row: usize) -> Result<Record, RowIssue> {
    let mut record = Record::new();
    for mapping in &spec.cells {
        let raw = &cells[mapping.index];
        let value = match mapping.kind {
            CellKind::Text => Value::Text(raw.clone()),
            CellKind::Number => match Value::parse_number(raw) {
                Some(n) => Value::Number(n),
                None => {
                    return Err(RowIssue::new(row, raw.clone(), "value is not numeric")
                        .in_column(&mapping.column));
                },
            },
        };
        record.set(mapping.column.as_str(), value);
    }
    Ok(record)
}

fn child_elements<'a>(
    parent: ElementRef<'a>,
    tag: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::source::CellMapping;

    fn bank_spec() -> HtmlTableSpec {
        HtmlTableSpec::new(
            0,
            vec![CellMapping::text(1, "Name"), CellMapping::number(2, "MC_USD_Billion")],
        )
    }

    #[test]
    fn test_second_table_selected_by_index() {
        let page = r#"
            <table><tbody><tr><td>1</td><td>Wrong</td><td>1.0</td></tr></tbody></table>
            <table><tbody><tr><td>1</td><td>Right</td><td>2.0</td></tr></tbody></table>
        "#;
        let spec = HtmlTableSpec {
            table_index: 1,
            ..bank_spec()
        };

        let extracted = extract(page, &spec).unwrap();
        assert_eq!(extracted.records.len(), 1);
        assert_eq!(extracted.records.rows()[0].get("Name"), Some(&Value::from("Right")));
    }

    #[test]
    fn test_missing_table_fails_source() {
        let page = "<table><tbody><tr><td>a</td></tr></tbody></table>";
        let spec = HtmlTableSpec {
            table_index: 3,
            ..bank_spec()
        };

        let err = extract(page, &spec).unwrap_err();
        assert!(matches!(err, ExtractError::TableNotFound { index: 3, available: 1 }));
    }

    #[test]
    fn test_unparseable_number_drops_only_that_row() {
        let page = r#"<table><tbody>
            <tr><td>1</td><td>AlphaBank</td><td>300.12</td></tr>
            <tr><td>2</td><td>Broken</td><td>n/a</td></tr>
            <tr><td>3</td><td>GammaBank</td><td>12</td></tr>
        </tbody></table>"#;

        let extracted = extract(page, &bank_spec()).unwrap();
        assert_eq!(extracted.records.len(), 2);
        assert_eq!(extracted.issues.len(), 1);
        assert_eq!(extracted.issues[0].row, 1);
        assert_eq!(extracted.issues[0].raw, "n/a");
        assert_eq!(extracted.records.rows()[1].get("Name"), Some(&Value::from("GammaBank")));
    }

    #[test]
    fn test_cell_text_includes_nested_markup() {
        let page = r#"<table><tbody>
            <tr><td>1</td><td><span class="flag"></span> <a href="/wiki/JPM">JPMorgan Chase</a>
            </td><td>432.92
            </td></tr>
        </tbody></table>"#;

        let extracted = extract(page, &bank_spec()).unwrap();
        let row = &extracted.records.rows()[0];
        assert_eq!(row.get("Name"), Some(&Value::from("JPMorgan Chase")));
        assert_eq!(row.get("MC_USD_Billion"), Some(&Value::Number(432.92)));
    }

    #[test]
    fn test_empty_mapping_rejected() {
        let spec = HtmlTableSpec::new(0, Vec::new());
        assert!(matches!(
            extract("<table></table>", &spec),
            Err(ExtractError::Settings(_))
        ));
    }
}
