//! XML extraction
//!
//! Expects `<root><record><col>..</col>..</record>..</root>`: one row per
//! direct child of the root named by [`XmlSpec::record_tag`].

use quick_xml::events::Event;
use quick_xml::Reader;
use tabflow_common::types::{Record, RecordSet, Value};

use super::{coerce_numeric, ExtractError, Extracted, RowIssue};
use crate::source::XmlSpec;

const ROOT_DEPTH: usize = 1;
const RECORD_DEPTH: usize = 2;
const FIELD_DEPTH: usize = 3;

/// Sub-element values of the row element being read.
#[derive(Default)]
struct PendingRow {
    fields: Vec<(String, String)>,
}

impl PendingRow {
    fn insert(&mut self, name: String, text: String) {
        // first occurrence wins
        if !self.fields.iter().any(|(n, _)| *n == name) {
            self.fields.push((name, text));
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }

    fn raw(&self) -> String {
        self.fields
            .iter()
            .map(|(n, t)| format!("<{0}>{1}</{0}>", n, t))
            .collect()
    }
}

/// Read the configured sub-elements of every row element.
///
/// A row missing one of them is dropped; malformed XML fails the source.
pub fn extract(content: &str, spec: &XmlSpec) -> Result<Extracted, ExtractError> {
    if spec.columns.is_empty() {
        return Err(ExtractError::Settings(
            "XML mapping has no columns".to_string(),
        ));
    }

    let mut records = RecordSet::empty(spec.columns.iter().map(String::as_str))?;
    let mut issues = Vec::new();

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut row_index = 0usize;
    let mut current: Option<PendingRow> = None;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            ExtractError::Xml(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(e) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if depth == RECORD_DEPTH && name == spec.record_tag {
                    current = Some(PendingRow::default());
                } else if depth == FIELD_DEPTH && current.is_some() {
                    field = Some(name);
                    text.clear();
                }
            },
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if depth == ROOT_DEPTH && name == spec.record_tag {
                    finish_row(PendingRow::default(), spec, row_index, &mut records, &mut issues)?;
                    row_index += 1;
                } else if depth == RECORD_DEPTH {
                    if let Some(row) = current.as_mut() {
                        row.insert(name, String::new());
                    }
                }
            },
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&t.unescape()?);
                }
            },
            Event::CData(c) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            },
            Event::End(_) => {
                if depth == FIELD_DEPTH {
                    if let (Some(name), Some(row)) = (field.take(), current.as_mut()) {
                        row.insert(name, text.trim().to_string());
                    }
                } else if depth == RECORD_DEPTH {
                    if let Some(row) = current.take() {
                        finish_row(row, spec, row_index, &mut records, &mut issues)?;
                        row_index += 1;
                    }
                }
                depth = depth.saturating_sub(1);
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(Extracted { records, issues })
}

fn finish_row(
    row: PendingRow,
    spec: &XmlSpec,
    index: usize,
    records: &mut RecordSet,
    issues: &mut Vec<RowIssue>,
) -> Result<(), ExtractError> {
    let mut record = Record::new();
    for column in &spec.columns {
        match row.get(column) {
            Some("") => record.set(column.as_str(), Value::Absent),
            Some(text) => record.set(column.as_str(), text),
            None => {
                issues.push(
                    RowIssue::new(index, row.raw(), format!("missing <{}> element", column))
                        .in_column(column),
                );
                return Ok(());
            },
        }
    }

    if let Err(issue) = coerce_numeric(&mut record, &spec.numeric_columns, index) {
        issues.push(issue);
        return Ok(());
    }

    records.append(record)?;
    Ok(())
}
