//! SQLite table sink
//!
//! Loading replaces the target table in one transaction: drop, create, insert.
//! Columns whose values are all numbers get `REAL` affinity, everything else
//! is `TEXT`; `Absent` cells are stored as `NULL`.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use tabflow_common::types::{Record, RecordSet, Value};
use tracing::{debug, info};

use super::SinkError;

/// A single-connection pool over one database file.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    /// Open (creating if needed) a database given as a file path or a
    /// `sqlite:` URL.
    pub async fn connect(database: &str) -> Result<Self, SinkError> {
        let options = if database.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(database)?
        } else {
            let path = Path::new(database);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::new().filename(path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.create_if_missing(true))
            .await?;

        info!(database = %database, "SQL connection initiated");
        Ok(Self { pool })
    }

    /// Replace `table` with the contents of `records`. Returns the number of
    /// rows inserted.
    pub async fn replace_table(
        &self,
        table: &str,
        records: &RecordSet,
    ) -> Result<u64, SinkError> {
        if table.trim().is_empty() {
            return Err(SinkError::InvalidTable(table.to_string()));
        }
        let table_ident = quote_ident(table);
        let columns = records.schema().columns();

        let definitions = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(c), affinity(records, c)))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table_ident,
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table_ident))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE {} ({})", table_ident, definitions))
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0;
        for row in records {
            let mut query = sqlx::query(&insert);
            for value in row.values() {
                query = match value {
                    Value::Number(n) => query.bind(*n),
                    Value::Text(s) => query.bind(s.as_str()),
                    Value::Absent => query.bind(Option::<String>::None),
                };
            }
            inserted += query.execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        info!(table = %table, rows = inserted, "Loaded table");
        Ok(inserted)
    }

    /// Run a read-only statement and return its rows.
    ///
    /// Integers and reals come back as numbers, `NULL` as `Absent`, anything
    /// else as text.
    pub async fn query(&self, sql: &str) -> Result<RecordSet, SinkError> {
        debug!(sql = %sql, "Running query");
        let statement = self.pool.prepare(sql).await?;
        let mut records =
            RecordSet::empty(unique_names(statement.columns().iter().map(|c| c.name())))?;

        let rows = statement.query().fetch_all(&self.pool).await?;
        for row in &rows {
            let record = records
                .schema()
                .columns()
                .iter()
                .enumerate()
                .map(|(i, name)| -> Result<(String, Value), SinkError> {
                    Ok((name.clone(), decode(row, i)?))
                })
                .collect::<Result<Record, SinkError>>()?;
            records.append(record)?;
        }
        Ok(records)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn decode(row: &SqliteRow, index: usize) -> Result<Value, SinkError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Absent);
    }
    let value = match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => Value::Number(row.try_get::<i64, _>(index)? as f64),
        "REAL" | "NUMERIC" => Value::Number(row.try_get::<f64, _>(index)?),
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(index)?;
            Value::Text(String::from_utf8_lossy(&bytes).into_owned())
        },
        _ => Value::Text(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

fn affinity(records: &RecordSet, column: &str) -> &'static str {
    let mut values = records
        .iter()
        .filter_map(|r| r.get(column))
        .filter(|v| !v.is_absent())
        .peekable();
    if values.peek().is_some() && values.all(Value::is_number) {
        "REAL"
    } else {
        "TEXT"
    }
}

/// Result column names with repeats suffixed by position: `Name`, `Name_2`.
fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for name in names {
        let mut candidate = name.to_string();
        let mut n = 2;
        while unique.contains(&candidate) {
            candidate = format!("{}_{}", name, n);
            n += 1;
        }
        unique.push(candidate);
    }
    unique
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
