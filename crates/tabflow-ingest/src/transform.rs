//! Column transforms
//!
//! A pipeline's transform stage is a list of [`TransformStep`]s applied in
//! order. Steps mutate cells, add derived columns or drop rows; the order of
//! the surviving rows never changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tabflow_common::types::{RecordSet, Value};
use tabflow_common::{ProgressLog, TabflowError};
use tracing::{debug, info, warn};

use crate::extract::{self, ExtractError, RowIssue};
use crate::source::CsvSpec;

/// Column names of an exchange-rate table
pub const RATE_CURRENCY_COLUMN: &str = "Currency";
pub const RATE_VALUE_COLUMN: &str = "Rate";

/// Most decimal places a rounding step may ask for
pub const MAX_ROUND_PLACES: u32 = 15;

// ============================================================================
// Steps
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformStep {
    /// Convert text cells to numbers
    Coerce {
        column: String,
        #[serde(default)]
        on_invalid: OnInvalid,
    },

    /// Round a numeric column half away from zero
    Round { column: String, places: u32 },

    /// `target = source * factor`
    Scale {
        source: String,
        target: String,
        factor: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        places: Option<u32>,
    },

    /// `target = source * rate(currency)`
    ConvertCurrency {
        source: String,
        target: String,
        currency: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        places: Option<u32>,
    },

    /// Keep rows whose value lies in `[min, max]`; non-numeric values are dropped
    FilterRange {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
}

impl TransformStep {
    /// Decimal places the step rounds to, if any.
    pub fn places(&self) -> Option<u32> {
        match self {
            TransformStep::Round { places, .. } => Some(*places),
            TransformStep::Scale { places, .. } | TransformStep::ConvertCurrency { places, .. } => {
                *places
            },
            TransformStep::Coerce { .. } | TransformStep::FilterRange { .. } => None,
        }
    }
}

/// What [`TransformStep::Coerce`] does with text that is not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnInvalid {
    #[default]
    Absent,
    Drop,
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Model(#[from] TabflowError),

    #[error("row {row}: column {column} holds {value:?}, expected a number")]
    NotNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error("no exchange rate for {0}")]
    MissingRate(String),

    #[error("exchange rate table needs Currency and Rate columns, found {0:?}")]
    RatesColumns(Vec<String>),

    #[error("invalid exchange rate table: {0}")]
    Rates(#[from] ExtractError),
}

// ============================================================================
// Exchange Rates
// ============================================================================

/// Currency code → units of that currency per unit of the source currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRates {
    rates: HashMap<String, f64>,
}

impl ExchangeRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, currency: impl Into<String>, rate: f64) -> Self {
        self.rates.insert(currency.into(), rate);
        self
    }

    /// Parse a `Currency,Rate` CSV. Rows that do not parse are skipped.
    pub fn from_csv(content: &str) -> Result<Self, TransformError> {
        let spec = CsvSpec {
            numeric_columns: vec![RATE_VALUE_COLUMN.to_string()],
        };
        let extracted = extract::csv::extract(content, &spec)?;
        let schema = extracted.records.schema();
        if !schema.contains(RATE_CURRENCY_COLUMN) || !schema.contains(RATE_VALUE_COLUMN) {
            return Err(TransformError::RatesColumns(schema.columns().to_vec()));
        }

        for issue in &extracted.issues {
            debug!(row = issue.row, "Skipping exchange rate row: {}", issue.reason);
        }

        let rates = extracted
            .records
            .iter()
            .filter_map(|row| {
                let currency = row.get(RATE_CURRENCY_COLUMN)?.as_str()?;
                let rate = row.get(RATE_VALUE_COLUMN)?.as_f64()?;
                Some((currency.trim().to_string(), rate))
            })
            .collect();

        Ok(Self { rates })
    }

    pub fn get(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Add every rate of `other`, replacing existing ones.
    pub fn merge(&mut self, other: ExchangeRates) {
        self.rates.extend(other.rates);
    }
}

// ============================================================================
// Transformer
// ============================================================================

#[derive(Clone, Default)]
pub struct Transformer {
    steps: Vec<TransformStep>,
    rates: ExchangeRates,
    progress: Option<Arc<dyn ProgressLog>>,
}

impl Transformer {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self {
            steps,
            rates: ExchangeRates::default(),
            progress: None,
        }
    }

    pub fn with_rates(mut self, rates: ExchangeRates) -> Self {
        self.rates = rates;
        self
    }

    /// Write every value a step could not use to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressLog>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    /// Run every step in order.
    pub fn apply(&self, mut records: RecordSet) -> Result<RecordSet, TransformError> {
        for step in &self.steps {
            let before = records.len();
            self.apply_step(step, &mut records)?;
            debug!(
                step = ?step,
                rows = records.len(),
                dropped = before - records.len(),
                "Applied transform"
            );
        }
        info!(steps = self.steps.len(), rows = records.len(), "Transform complete");
        Ok(records)
    }

    fn apply_step(
        &self,
        step: &TransformStep,
        records: &mut RecordSet,
    ) -> Result<(), TransformError> {
        match step {
            TransformStep::Coerce { column, on_invalid } => {
                let issues = coerce(records, column, *on_invalid)?;
                self.report(&issues);
                Ok(())
            },
            TransformStep::Round { column, places } => records.try_map_column(column, |row, value| {
                Ok(match numeric(value, row, column)? {
                    Some(n) => Value::Number(Value::round_number(n, *places)),
                    None => Value::Absent,
                })
            }),
            TransformStep::Scale {
                source,
                target,
                factor,
                places,
            } => derive(records, source, target, *factor, *places),
            TransformStep::ConvertCurrency {
                source,
                target,
                currency,
                places,
            } => {
                let rate = self
                    .rates
                    .get(currency)
                    .ok_or_else(|| TransformError::MissingRate(currency.clone()))?;
                derive(records, source, target, rate, *places)
            },
            TransformStep::FilterRange { column, min, max } => {
                if !records.schema().contains(column) {
                    return Err(TabflowError::UnknownColumn(column.clone()).into());
                }
                records.retain(|row| {
                    row.get(column).and_then(Value::as_f64).is_some_and(|n| {
                        min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)
                    })
                });
                Ok(())
            },
        }
    }

    fn report(&self, issues: &[RowIssue]) {
        for issue in issues {
            warn!(row = issue.row, raw = %issue.raw, "{}", issue.reason);
            if let Some(progress) = &self.progress {
                progress.log(&format!("{}: transform {}", issue.kind(), issue));
            }
        }
    }
}

/// Numeric view of a cell; `Absent` is `None`, other text is an error.
fn numeric(value: &Value, row: usize, column: &str) -> Result<Option<f64>, TransformError> {
    match value {
        Value::Absent => Ok(None),
        other => other.as_f64().map(Some).ok_or_else(|| TransformError::NotNumeric {
            row,
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Convert `column` to numbers. Returns one issue per value that did not parse.
fn coerce(
    records: &mut RecordSet,
    column: &str,
    on_invalid: OnInvalid,
) -> Result<Vec<RowIssue>, TransformError> {
    let reason = match on_invalid {
        OnInvalid::Absent => "value is not numeric, left empty",
        OnInvalid::Drop => "value is not numeric, row dropped",
    };
    let mut issues = Vec::new();
    records.try_map_column(column, |row, value| {
        Ok::<_, TransformError>(match value {
            Value::Absent => Value::Absent,
            other => match other.as_f64() {
                Some(n) => Value::Number(n),
                None => {
                    issues.push(RowIssue::new(row, other.to_string(), reason).in_column(column));
                    Value::Absent
                },
            },
        })
    })?;

    if on_invalid == OnInvalid::Drop && !issues.is_empty() {
        debug!(column, rows = issues.len(), "Dropping rows with non-numeric values");
        let mut index = 0;
        records.retain(|_| {
            let keep = !issues.iter().any(|issue| issue.row == index);
            index += 1;
            keep
        });
    }
    Ok(issues)
}

fn derive(
    records: &mut RecordSet,
    source: &str,
    target: &str,
    factor: f64,
    places: Option<u32>,
) -> Result<(), TransformError> {
    if !records.schema().contains(source) {
        return Err(TabflowError::UnknownColumn(source.to_string()).into());
    }
    records.try_add_column(target, |row, record| {
        let value = record.get(source).cloned().unwrap_or_default();
        Ok(match numeric(&value, row, source)? {
            Some(n) => {
                let scaled = n * factor;
                Value::Number(places.map_or(scaled, |p| Value::round_number(scaled, p)))
            },
            None => Value::Absent,
        })
    })
}
