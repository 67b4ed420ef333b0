//! CSV extraction

use tabflow_common::types::{Record, RecordSet, Value};

use super::{coerce_numeric, ExtractError, Extracted, RowIssue};
use crate::source::CsvSpec;

/// Parse comma-delimited text with a header line.
///
/// The output schema is exactly the header. Lines with the wrong number of
/// fields are dropped, empty fields become `Absent`.
pub fn extract(content: &str, spec: &CsvSpec) -> Result<Extracted, ExtractError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .flexible(true)
        .trim(::csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(ExtractError::MissingHeader);
    }

    let mut records = RecordSet::empty(headers.iter())?;
    let mut issues = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let fields = match result {
            Ok(fields) => fields,
            Err(e) => {
                issues.push(RowIssue::new(row, String::new(), e.to_string()));
                continue;
            },
        };

        if fields.len() != headers.len() {
            let line = fields.position().map(|p| p.line()).unwrap_or_default();
            issues.push(RowIssue::new(
                row,
                fields.iter().collect::<Vec<_>>().join(","),
                format!(
                    "line {} has {} fields, header has {}",
                    line,
                    fields.len(),
                    headers.len()
                ),
            ));
            continue;
        }

        let mut record: Record = headers
            .iter()
            .zip(fields.iter())
            .map(|(column, field)| {
                let value = if field.is_empty() {
                    Value::Absent
                } else {
                    Value::from(field)
                };
                (column, value)
            })
            .collect();

        if let Err(issue) = coerce_numeric(&mut record, &spec.numeric_columns, row) {
            issues.push(issue);
            continue;
        }

        records.append(record)?;
    }

    Ok(Extracted { records, issues })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const CARS: &str = "car_model,year_of_manufacture,price,fuel\n\
                        ritz,2014,5000.0,Petrol\n\
                        sx4,2013,7089.55,Diesel\n\
                        ciaz,2017,,Petrol\n";

    #[test]
    fn test_rows_preserved_exactly() {
        let extracted = extract(CARS, &CsvSpec::default()).unwrap();

        assert!(extracted.issues.is_empty());
        assert_eq!(
            extracted.records.schema().columns(),
            &["car_model", "year_of_manufacture", "price", "fuel"]
        );
        assert_eq!(extracted.records.len(), 3);

        let sx4 = &extracted.records.rows()[1];
        assert_eq!(sx4.get("car_model"), Some(&Value::from("sx4")));
        assert_eq!(sx4.get("price"), Some(&Value::from("7089.55")));
        assert!(extracted.records.rows()[2].get("price").is_some_and(Value::is_absent));
    }

    #[test]
    fn test_wrong_field_count_dropped() {
        let content = "Currency,Rate\nEUR,0.93\nGBP\nINR,82.95\n";
        let extracted = extract(content, &CsvSpec::default()).unwrap();

        assert_eq!(extracted.records.len(), 2);
        assert_eq!(extracted.issues.len(), 1);
        assert_eq!(extracted.issues[0].row, 1);
        assert_eq!(extracted.issues[0].raw, "GBP");
    }

    #[test]
    fn test_numeric_columns_coerced() {
        let spec = CsvSpec {
            numeric_columns: vec!["price".to_string()],
        };
        let content = "car_model,price\nritz,\"5,000.5\"\nalto,cheap\n";

        let extracted = extract(content, &spec).unwrap();
        assert_eq!(extracted.records.len(), 1);
        assert_eq!(extracted.records.rows()[0].get("price"), Some(&Value::Number(5000.5)));
        assert_eq!(extracted.issues[0].column.as_deref(), Some("price"));
    }

    #[test]
    fn test_duplicate_header_fails_source() {
        let err = extract("a,a\n1,2\n", &CsvSpec::default()).unwrap_err();
        assert!(matches!(err, ExtractError::Model(_)));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        let err = extract("", &CsvSpec::default()).unwrap_err();
        assert!(matches!(err, ExtractError::MissingHeader));
    }
}
