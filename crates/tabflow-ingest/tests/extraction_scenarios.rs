//! Extraction behaviour across formats
//!
//! Covers row preservation for well-formed input, row-level drops, and the
//! bank, vehicle and film table scenarios.

use tabflow_common::types::Value;
use tabflow_common::ErrorKind;
use tabflow_ingest::extract::{self, ExtractError};
use tabflow_ingest::source::{CellMapping, CsvSpec, HtmlTableSpec, JsonSpec, SourceFormat, XmlSpec};
use tabflow_ingest::transform::{TransformStep, Transformer};

fn car_columns() -> Vec<&'static str> {
    vec!["car_model", "year_of_manufacture", "price", "fuel"]
}

// ============================================================================
// Well-formed input
// ============================================================================

#[test]
fn test_well_formed_sources_keep_every_row() {
    let csv = "car_model,year_of_manufacture,price,fuel\n\
               ritz,2014,5000.0,Petrol\n\
               sx4,2013,7089.552238805969,Diesel\n";
    let json = r#"[
        {"car_model": "ritz", "year_of_manufacture": "2014",
         "price": "5000.0", "fuel": "Petrol"},
        {"car_model": "sx4", "year_of_manufacture": "2013",
         "price": "7089.552238805969", "fuel": "Diesel"}
    ]"#;
    let xml = "<data>\
        <record><car_model>ritz</car_model><year_of_manufacture>2014</year_of_manufacture>\
        <price>5000.0</price><fuel>Petrol</fuel></record>\
        <record><car_model>sx4</car_model><year_of_manufacture>2013</year_of_manufacture>\
        <price>7089.552238805969</price><fuel>Diesel</fuel></record>\
        </data>";

    let formats = [
        (SourceFormat::Csv(CsvSpec::default()), csv),
        (SourceFormat::Json(JsonSpec::default()), json),
        (SourceFormat::Xml(XmlSpec::new("record", car_columns())), xml),
    ];

    for (format, content) in formats {
        let extracted = extract::extract(&format, content).unwrap();
        assert!(extracted.issues.is_empty(), "{} reported issues", format.name());
        assert_eq!(extracted.records.len(), 2, "{} row count", format.name());
        assert_eq!(extracted.records.schema().columns(), car_columns().as_slice());

        let sx4 = &extracted.records.rows()[1];
        assert_eq!(sx4.get("car_model"), Some(&Value::from("sx4")));
        assert_eq!(sx4.get("price"), Some(&Value::from("7089.552238805969")));
    }
}

#[test]
fn test_one_malformed_row_per_format() {
    let csv = "car_model,price\nritz,5000\nalto,1,extra\nsx4,7089\n";
    let jsonl = "{\"car_model\":\"ritz\",\"price\":5000}\n\
                 {\"car_model\":\n\
                 {\"car_model\":\"sx4\",\"price\":7089}\n";
    let xml = "<data>\
        <record><car_model>ritz</car_model><price>5000</price></record>\
        <record><car_model>alto</car_model></record>\
        <record><car_model>sx4</car_model><price>7089</price></record>\
        </data>";

    let formats = [
        (SourceFormat::Csv(CsvSpec::default()), csv),
        (SourceFormat::Json(JsonSpec::default()), jsonl),
        (SourceFormat::Xml(XmlSpec::new("record", ["car_model", "price"])), xml),
    ];

    for (format, content) in formats {
        let extracted = extract::extract(&format, content).unwrap();
        assert_eq!(extracted.records.len(), 2, "{}", format.name());
        assert_eq!(extracted.issues.len(), 1, "{}", format.name());
        assert_eq!(extracted.issues[0].row, 1);
        assert_eq!(extracted.issues[0].kind(), ErrorKind::ParseFailure);

        let models: Vec<_> = extracted
            .records
            .iter()
            .filter_map(|r| r.get("car_model")?.as_str())
            .collect();
        assert_eq!(models, vec!["ritz", "sx4"], "{}", format.name());
    }
}

#[test]
fn test_document_level_failures_carry_parse_failure_kind() {
    let err = extract::extract(&SourceFormat::Json(JsonSpec::default()), "[{\"a\": ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseFailure);

    let err = extract::extract(
        &SourceFormat::Xml(XmlSpec::new("record", ["a"])),
        "<data><record><a>1</b></record></data>",
    )
    .unwrap_err();
    assert!(matches!(err, ExtractError::Xml(_)));
    assert_eq!(err.kind(), ErrorKind::ParseFailure);
}

// ============================================================================
// Scenarios
// ============================================================================

/// Bank table with a header row and a thousands separator.
#[test]
fn test_bank_table_rows() {
    let page = r#"<html><body><table><tbody>
        <tr><th>Rank</th><th>Bank name</th></tr>
        <tr><td>1</td><td>AlphaBank</td><td>300.12</td></tr>
        <tr><td>2</td><td>BetaBank</td><td>1,250.5
        </td></tr>
    </tbody></table></body></html>"#;

    let spec = HtmlTableSpec::new(
        0,
        vec![CellMapping::text(1, "Name"), CellMapping::number(2, "MC_USD_Billion")],
    );
    let extracted = extract::extract(&SourceFormat::HtmlTable(spec), page).unwrap();

    assert!(extracted.issues.is_empty());
    assert_eq!(extracted.records.len(), 2);
    let rows = extracted.records.rows();
    assert_eq!(rows[0].get("Name"), Some(&Value::from("AlphaBank")));
    assert_eq!(rows[0].get("MC_USD_Billion"), Some(&Value::Number(300.12)));
    assert_eq!(rows[1].get("Name"), Some(&Value::from("BetaBank")));
    assert_eq!(rows[1].get("MC_USD_Billion"), Some(&Value::Number(1250.5)));
}

/// JSON Lines with one unparseable price, then rounding.
#[test]
fn test_vehicle_price_rounding_and_bad_price() {
    let content = "{\"car_model\":\"X1\",\"year_of_manufacture\":\"2001\",\
                   \"price\":\"19999.999\",\"fuel\":\"gas\"}\n\
                   {\"car_model\":\"Y2\",\"price\":\"bad\"}\n";
    let spec = JsonSpec {
        numeric_columns: vec!["price".to_string()],
    };

    let extracted = extract::extract(&SourceFormat::Json(spec), content).unwrap();
    assert_eq!(extracted.records.len(), 1);
    assert_eq!(extracted.issues.len(), 1);
    assert_eq!(extracted.issues[0].column.as_deref(), Some("price"));
    assert_eq!(extracted.issues[0].raw, "bad");
    assert_eq!(extracted.issues[0].row, 1);
    assert_eq!(
        extracted.records.schema().columns(),
        &["car_model", "year_of_manufacture", "price", "fuel"]
    );

    let rounded = Transformer::new(vec![TransformStep::Round {
        column: "price".into(),
        places: 2,
    }])
    .apply(extracted.records)
    .unwrap();
    let price = rounded.rows()[0].get("price").unwrap();
    assert_eq!(price, &Value::Number(20000.0));
    assert_eq!(price.to_string(), "20000.0");
}

/// Row cap on a long film table.
#[test]
fn test_film_table_row_cap() {
    let mut page = String::from("<table><tbody><tr><th>Rank</th><th>Film</th><th>Year</th></tr>");
    for rank in 1..=40 {
        page.push_str(&format!(
            "<tr><td>{0}</td><td>Film {0}</td><td>{1}</td></tr>",
            rank,
            1990 + rank
        ));
    }
    page.push_str("</tbody></table>");

    let spec = HtmlTableSpec::new(
        0,
        vec![
            CellMapping::text(0, "Rank"),
            CellMapping::text(1, "Film"),
            CellMapping::text(2, "Year"),
        ],
    )
    .with_row_limit(25);

    let extracted = extract::extract(&SourceFormat::HtmlTable(spec), &page).unwrap();
    assert_eq!(extracted.records.len(), 25);

    let ranks: Vec<_> = extracted
        .records
        .iter()
        .filter_map(|r| r.get("Rank")?.as_str().map(str::to_string))
        .collect();
    let expected: Vec<_> = (1..=25).map(|r| r.to_string()).collect();
    assert_eq!(ranks, expected);
}
