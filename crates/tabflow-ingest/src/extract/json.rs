//! JSON extraction: a single array of objects, or JSON Lines

use serde_json::Value as JsonValue;
use tabflow_common::types::{Record, RecordSet, Schema, Value};

use super::{coerce_numeric, ExtractError, Extracted, RowIssue};
use crate::source::JsonSpec;

/// Parse a JSON array of objects or newline-delimited objects.
///
/// A payload whose first non-whitespace character is `[` is read as one
/// array; anything else as JSON Lines. The schema is the union of keys over
/// the accepted rows, in first-seen order; keys a row lacks are `Absent`.
pub fn extract(content: &str, spec: &JsonSpec) -> Result<Extracted, ExtractError> {
    let mut rows = Vec::new();
    let mut issues = Vec::new();

    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let items: Vec<JsonValue> = serde_json::from_str(trimmed)?;
        for (row, item) in items.into_iter().enumerate() {
            let raw = item.to_string();
            collect_row(row_from_value(item, row, &raw), spec, row, &mut rows, &mut issues);
        }
    } else {
        let lines = content.lines().filter(|l| !l.trim().is_empty());
        for (row, line) in lines.enumerate() {
            let parsed = serde_json::from_str::<JsonValue>(line)
                .map_err(|e| RowIssue::new(row, line.trim(), format!("malformed JSON: {}", e)))
                .and_then(|item| row_from_value(item, row, line.trim()));
            collect_row(parsed, spec, row, &mut rows, &mut issues);
        }
    }

    let mut schema = Vec::<String>::new();
    for record in &rows {
        for column in record.columns() {
            if !schema.iter().any(|c| c == column) {
                schema.push(column.to_string());
            }
        }
    }

    let mut records = RecordSet::with_schema(Schema::new(schema)?);
    for mut record in rows {
        for column in records.schema().columns() {
            if record.get(column).is_none() {
                record.set(column.as_str(), Value::Absent);
            }
        }
        records.append(record)?;
    }

    Ok(Extracted { records, issues })
}

fn collect_row(
    parsed: Result<Record, RowIssue>,
    spec: &JsonSpec,
    row: usize,
    rows: &mut Vec<Record>,
    issues: &mut Vec<RowIssue>,
) {
    let result = parsed.and_then(|mut record| {
        coerce_numeric(&mut record, &spec.numeric_columns, row)?;
        Ok(record)
    });
    match result {
        Ok(record) => rows.push(record),
        Err(issue) => issues.push(issue),
    }
}

fn row_from_value(item: JsonValue, row: usize, raw: &str) -> Result<Record, RowIssue> {
    match item {
        JsonValue::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, cell_value(value)))
            .collect()),
        _ => Err(RowIssue::new(row, raw, "expected a JSON object")),
    }
}

fn cell_value(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Absent,
        JsonValue::String(s) => Value::Text(s),
        JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Absent),
        JsonValue::Bool(b) => Value::Text(b.to_string()),
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::Text(nested.to_string()),
    }
}
