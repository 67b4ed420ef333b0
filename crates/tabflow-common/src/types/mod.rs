//! Canonical tabular types shared by every pipeline stage
//!
//! Every extractor produces a [`RecordSet`], the aggregator merges them, the
//! transformer rewrites them and the sinks consume them. The schema travels with
//! the rows so compatibility can be checked at each join point instead of being
//! discovered when a sink writes a ragged table.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabflowError};

// ============================================================================
// Cell Values
// ============================================================================

/// A single cell.
///
/// `Absent` is a typed null: it is never rendered or treated as zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Text(String),
    Number(f64),
    #[default]
    Absent,
}

impl Value {
    /// Parse a numeric cell the way scraped pages format them.
    ///
    /// Thousands separators and any whitespace (including embedded newlines)
    /// are removed before parsing. Empty input and non-finite results are
    /// rejected.
    ///
    /// ```
    /// use tabflow_common::types::Value;
    ///
    /// assert_eq!(Value::parse_number("1,250.5\n"), Some(1250.5));
    /// assert_eq!(Value::parse_number("n/a"), None);
    /// ```
    pub fn parse_number(raw: &str) -> Option<f64> {
        let cleaned: String = raw
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();

        if cleaned.is_empty() {
            return None;
        }

        cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Numeric view of the cell. Text is parsed with [`Value::parse_number`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => Self::parse_number(s),
            Value::Absent => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Round a number to `places` decimal places, half away from zero.
    ///
    /// Values too large to scale, or precision past what an `f64` holds, come
    /// back unchanged.
    pub fn round_number(value: f64, places: u32) -> f64 {
        let factor = 10f64.powi(i32::try_from(places).unwrap_or(i32::MAX));
        let scaled = value * factor;
        if !factor.is_finite() || !scaled.is_finite() {
            return value;
        }
        scaled.round() / factor
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            // Debug keeps the trailing ".0" on integral values
            Value::Number(n) => write!(f, "{:?}", n),
            Value::Absent => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Absent)
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Ordered, duplicate-free list of column names.
///
/// Two schemas are compatible when they hold the same set of columns; order
/// only matters for how rows are laid out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self::default();
        for column in columns {
            schema.push(column.into())?;
        }
        Ok(schema)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index_of(column).is_some()
    }

    /// Same column set, regardless of order.
    pub fn is_compatible(&self, other: &Schema) -> bool {
        self.len() == other.len() && other.columns.iter().all(|c| self.contains(c))
    }

    fn push(&mut self, column: String) -> Result<()> {
        if self.contains(&column) {
            return Err(TabflowError::DuplicateColumn(column));
        }
        self.columns.push(column);
        Ok(())
    }
}

impl TryFrom<Vec<String>> for Schema {
    type Error = TabflowError;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<Schema> for Vec<String> {
    fn from(schema: Schema) -> Self {
        schema.columns
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.columns.join(", "))
    }
}

// ============================================================================
// Records
// ============================================================================

/// One row: an ordered mapping from column name to [`Value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Insert or replace a cell. New columns go to the end.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when the record holds exactly the schema's columns.
    pub fn matches(&self, schema: &Schema) -> bool {
        self.len() == schema.len() && self.columns().all(|c| schema.contains(c))
    }

    fn take(&mut self, column: &str) -> Value {
        self.fields
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, value)| std::mem::take(value))
            .unwrap_or_default()
    }

    /// Rebuild the record in schema order. Caller guarantees `matches(schema)`.
    fn reordered(mut self, schema: &Schema) -> Self {
        if self.columns().eq(schema.columns().iter().map(String::as_str)) {
            return self;
        }
        let fields = schema
            .columns()
            .iter()
            .map(|c| (c.clone(), self.take(c)))
            .collect();
        Self { fields }
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (S, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.set(column, value);
        }
        record
    }
}

// ============================================================================
// Record Sets
// ============================================================================

/// Ordered rows sharing one schema.
///
/// Every row holds exactly the schema's columns in schema order; insertion
/// order is preserved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    schema: Schema,
    rows: Vec<Record>,
}

impl RecordSet {
    /// Zero rows with the given columns.
    pub fn empty<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::with_schema(Schema::new(columns)?))
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    /// Append one record.
    ///
    /// Fails with [`TabflowError::SchemaMismatch`] when the record's column
    /// set differs from the schema; the set is left untouched in that case.
    pub fn append(&mut self, record: Record) -> Result<()> {
        if !record.matches(&self.schema) {
            return Err(TabflowError::SchemaMismatch {
                expected: self.schema.columns().to_vec(),
                found: record.columns().map(str::to_string).collect(),
            });
        }
        self.rows.push(record.reordered(&self.schema));
        Ok(())
    }

    /// Append every row of a compatible set, keeping its row order.
    pub fn extend_from(&mut self, other: RecordSet) -> Result<()> {
        if !self.schema.is_compatible(&other.schema) {
            return Err(TabflowError::SchemaMismatch {
                expected: self.schema.columns().to_vec(),
                found: other.schema.columns().to_vec(),
            });
        }
        let schema = &self.schema;
        self.rows
            .extend(other.rows.into_iter().map(|r| r.reordered(schema)));
        Ok(())
    }

    /// Values of one column in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        if !self.schema.contains(column) {
            return None;
        }
        Some(self.rows.iter().filter_map(|r| r.get(column)).collect())
    }

    /// Keep rows matching the predicate; surviving rows keep their order.
    pub fn retain<F>(&mut self, predicate: F)
    where
        F: FnMut(&Record) -> bool,
    {
        self.rows.retain(predicate);
    }

    /// Rewrite one column in place, row by row.
    pub fn try_map_column<E, F>(&mut self, column: &str, mut f: F) -> std::result::Result<(), E>
    where
        E: From<TabflowError>,
        F: FnMut(usize, &Value) -> std::result::Result<Value, E>,
    {
        if !self.schema.contains(column) {
            return Err(TabflowError::UnknownColumn(column.to_string()).into());
        }
        for (index, row) in self.rows.iter_mut().enumerate() {
            let current = row.get(column).cloned().unwrap_or_default();
            let next = f(index, &current)?;
            row.set(column, next);
        }
        Ok(())
    }

    /// Compute a derived column from each row.
    ///
    /// All values are computed before anything is written, so a failing row
    /// leaves the set unchanged. An existing column of the same name is
    /// overwritten in place; otherwise the column is appended to the schema.
    pub fn try_add_column<E, F>(&mut self, column: &str, mut f: F) -> std::result::Result<(), E>
    where
        E: From<TabflowError>,
        F: FnMut(usize, &Record) -> std::result::Result<Value, E>,
    {
        let values = self
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| f(index, row))
            .collect::<std::result::Result<Vec<_>, E>>()?;

        if !self.schema.contains(column) {
            self.schema.push(column.to_string())?;
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.set(column, value);
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
