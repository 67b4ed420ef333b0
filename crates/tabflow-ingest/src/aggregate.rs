//! Source aggregation
//!
//! Folds per-source extraction outcomes into one [`RecordSet`] of the
//! pipeline's target schema. A failing source is recorded and skipped; only
//! an empty final result stops the run.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tabflow_common::types::{RecordSet, Schema};
use tabflow_common::{ErrorKind, ProgressLog, TabflowError};
use tracing::{info, warn};

use crate::extract::{self, ExtractError, Extracted};
use crate::loader::SourceLoader;
use crate::source::SourceDescriptor;

/// Default number of sources loaded and extracted at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// A source that contributed nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub kind: ErrorKind,
    pub reason: String,
}

impl SourceFailure {
    pub fn new(source: impl Into<String>, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.kind, self.source, self.reason)
    }
}

/// Result of extracting one source.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Ok(Extracted),
    Failed(SourceFailure),
}

impl ExtractionOutcome {
    pub fn from_result(source: &str, result: Result<Extracted, ExtractError>) -> Self {
        match result {
            Ok(extracted) => ExtractionOutcome::Ok(extracted),
            Err(e) => {
                ExtractionOutcome::Failed(SourceFailure::new(source, e.kind(), e.to_string()))
            },
        }
    }
}

/// Accumulated rows plus what was lost on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub records: RecordSet,
    pub failures: Vec<SourceFailure>,
    pub dropped_rows: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("no records extracted ({} source failures)", .failures.len())]
    EmptyResult { failures: Vec<SourceFailure> },
}

impl AggregateError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::EmptyResult
    }
}

pub struct Aggregator {
    target: Schema,
    progress: Arc<dyn ProgressLog>,
}

impl Aggregator {
    pub fn new(target: Schema, progress: Arc<dyn ProgressLog>) -> Self {
        Self { target, progress }
    }

    pub fn target(&self) -> &Schema {
        &self.target
    }

    /// Fold outcomes in order: source order first, then row order.
    ///
    /// Every dropped row and every skipped source is written to the progress
    /// log. Fails with [`AggregateError::EmptyResult`] when no rows survive.
    pub fn aggregate<I>(&self, outcomes: I) -> Result<Aggregation, AggregateError>
    where
        I: IntoIterator<Item = (String, ExtractionOutcome)>,
    {
        let mut records = RecordSet::with_schema(self.target.clone());
        let mut failures = Vec::new();
        let mut dropped_rows = 0;

        for (source, outcome) in outcomes {
            let extracted = match outcome {
                ExtractionOutcome::Ok(extracted) => extracted,
                ExtractionOutcome::Failed(failure) => {
                    self.report(&failure);
                    failures.push(failure);
                    continue;
                },
            };

            let rows = extracted.records.len();
            if let Err(e) = records.extend_from(extracted.records) {
                let failure = SourceFailure::new(&source, schema_error_kind(&e), e.to_string());
                self.report(&failure);
                failures.push(failure);
                continue;
            }

            for issue in &extracted.issues {
                warn!(source = %source, row = issue.row, raw = %issue.raw, "{}", issue.reason);
                self.progress
                    .log(&format!("{}: {} {}", issue.kind(), source, issue));
            }
            dropped_rows += extracted.issues.len();
            info!(source = %source, rows, "Source aggregated");
        }

        if records.is_empty() {
            self.progress.log(&format!(
                "{}: no records extracted from any source ({} failed)",
                ErrorKind::EmptyResult,
                failures.len()
            ));
            return Err(AggregateError::EmptyResult { failures });
        }

        Ok(Aggregation {
            records,
            failures,
            dropped_rows,
        })
    }

    /// Load, extract and aggregate every descriptor.
    ///
    /// Up to `concurrency` sources are in flight at once, but outcomes are
    /// consumed in descriptor order so the output is deterministic.
    pub async fn collect(
        &self,
        descriptors: &[SourceDescriptor],
        loader: &dyn SourceLoader,
        concurrency: usize,
    ) -> Result<Aggregation, AggregateError> {
        let outcomes = self.load_all(descriptors, loader, concurrency).await;
        self.aggregate(outcomes)
    }

    /// Load and extract every descriptor, returning outcomes in descriptor
    /// order. A load failure becomes a `SourceUnavailable` outcome.
    pub async fn load_all(
        &self,
        descriptors: &[SourceDescriptor],
        loader: &dyn SourceLoader,
        concurrency: usize,
    ) -> Vec<(String, ExtractionOutcome)> {
        info!(sources = descriptors.len(), concurrency, "Extracting sources");

        stream::iter(descriptors)
            .map(|descriptor| async move {
                let outcome = match loader.load(&descriptor.location).await {
                    Ok(content) => ExtractionOutcome::from_result(
                        &descriptor.id,
                        extract::extract(&descriptor.format, &content),
                    ),
                    Err(e) => ExtractionOutcome::Failed(SourceFailure::new(
                        &descriptor.id,
                        ErrorKind::SourceUnavailable,
                        e.to_string(),
                    )),
                };
                (descriptor.id.clone(), outcome)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    fn report(&self, failure: &SourceFailure) {
        warn!(source = %failure.source, kind = %failure.kind, "Source skipped: {}", failure.reason);
        self.progress.log(&failure.to_string());
    }
}

fn schema_error_kind(err: &TabflowError) -> ErrorKind {
    match err {
        TabflowError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
        _ => ErrorKind::ParseFailure,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::extract::RowIssue;
    use tabflow_common::progress::MemoryProgressLog;
    use tabflow_common::types::{Record, Value};

    fn cars(names: &[&str]) -> Extracted {
        let mut records = RecordSet::empty(["car_model", "fuel"]).unwrap();
        for name in names {
            records
                .append(Record::new().with("car_model", *name).with("fuel", "Petrol"))
                .unwrap();
        }
        Extracted::new(records)
    }

    fn aggregator() -> (Aggregator, Arc<MemoryProgressLog>) {
        let log = Arc::new(MemoryProgressLog::new());
        let schema = Schema::new(["car_model", "fuel"]).unwrap();
        (Aggregator::new(schema, log.clone()), log)
    }

    #[test]
    fn test_rows_in_source_then_row_order() {
        let (aggregator, _) = aggregator();
        let result = aggregator
            .aggregate(vec![
                ("a.csv".to_string(), ExtractionOutcome::Ok(cars(&["ritz", "sx4"]))),
                ("b.json".to_string(), ExtractionOutcome::Ok(cars(&["ciaz"]))),
            ])
            .unwrap();

        let names: Vec<_> = result
            .records
            .column_values("car_model")
            .unwrap()
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(names, vec![Value::from("ritz"), Value::from("sx4"), Value::from("ciaz")]);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_reordered_columns_are_compatible() {
        let (aggregator, _) = aggregator();
        let mut swapped = RecordSet::empty(["fuel", "car_model"]).unwrap();
        swapped
            .append(Record::new().with("fuel", "CNG").with("car_model", "wagon r"))
            .unwrap();

        let result = aggregator
            .aggregate(vec![("x.xml".to_string(), ExtractionOutcome::Ok(Extracted::new(swapped)))])
            .unwrap();
        assert_eq!(result.records.schema().columns(), &["car_model", "fuel"]);
        assert_eq!(result.records.rows()[0].get("fuel"), Some(&Value::from("CNG")));
    }

    #[test]
    fn test_schema_mismatch_discards_source() {
        let (aggregator, log) = aggregator();
        let other = RecordSet::empty(["Name", "MC_USD_Billion"]).unwrap();

        let result = aggregator
            .aggregate(vec![
                ("banks.csv".to_string(), ExtractionOutcome::Ok(Extracted::new(other))),
                ("cars.csv".to_string(), ExtractionOutcome::Ok(cars(&["ritz"]))),
            ])
            .unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, ErrorKind::SchemaMismatch);
        assert_eq!(log.matching("SchemaMismatch: banks.csv").len(), 1);
    }

    #[test]
    fn test_row_issues_logged_with_source_and_raw_value() {
        let (aggregator, log) = aggregator();
        let mut extracted = cars(&["ritz"]);
        extracted
            .issues
            .push(RowIssue::new(3, "bad", "value is not numeric").in_column("price"));

        let result = aggregator
            .aggregate(vec![("cars.json".to_string(), ExtractionOutcome::Ok(extracted))])
            .unwrap();

        assert_eq!(result.dropped_rows, 1);
        let lines = log.matching("ParseFailure: cars.json row 3");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"bad\""));
    }

    #[test]
    fn test_discarded_source_rows_not_counted_as_dropped() {
        let (aggregator, log) = aggregator();
        let mut other = Extracted::new(RecordSet::empty(["Name", "MC_USD_Billion"]).unwrap());
        other
            .issues
            .push(RowIssue::new(0, "x", "value is not numeric").in_column("MC_USD_Billion"));

        let result = aggregator
            .aggregate(vec![
                ("banks.csv".to_string(), ExtractionOutcome::Ok(other)),
                ("cars.csv".to_string(), ExtractionOutcome::Ok(cars(&["ritz"]))),
            ])
            .unwrap();

        assert_eq!(result.dropped_rows, 0);
        assert_eq!(result.failures[0].kind, ErrorKind::SchemaMismatch);
        assert!(log.matching("ParseFailure: banks.csv").is_empty());
    }

    #[test]
    fn test_all_failed_is_empty_result() {
        let (aggregator, log) = aggregator();
        let err = aggregator
            .aggregate(vec![(
                "gone.csv".to_string(),
                ExtractionOutcome::Failed(SourceFailure::new(
                    "gone.csv",
                    ErrorKind::SourceUnavailable,
                    "not found",
                )),
            )])
            .unwrap_err();

        let AggregateError::EmptyResult { failures } = &err;
        assert_eq!(failures.len(), 1);
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
        assert_eq!(log.matching("SourceUnavailable: gone.csv").len(), 1);
        assert_eq!(log.matching("EmptyResult").len(), 1);
    }
}
