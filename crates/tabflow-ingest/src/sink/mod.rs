//! Output sinks
//!
//! A transformed [`RecordSet`](tabflow_common::RecordSet) is written to a CSV
//! file and, optionally, to a SQLite table. Both write columns in schema order
//! and rows in record order.

pub mod flat_file;
pub mod sqlite;

pub use flat_file::{write_csv, write_csv_file};
pub use sqlite::SqliteSink;

use tabflow_common::TabflowError;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Model(#[from] TabflowError),

    #[error("invalid table name {0:?}")]
    InvalidTable(String),
}
