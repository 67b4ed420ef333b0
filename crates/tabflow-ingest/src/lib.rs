//! tabflow ingest library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Batch ETL over heterogeneous tabular sources: HTML tables scraped from web
//! pages, and CSV, JSON and XML files. Every source is normalized into one
//! [`RecordSet`](tabflow_common::RecordSet) of a fixed target schema, then
//! transformed and written to a CSV file and a SQLite table.
//!
//! # Stages
//!
//! - **Load**: [`loader::SourceLoader`] fetches URLs and reads files
//! - **Extract**: one pure extractor per [`source::SourceFormat`]
//! - **Aggregate**: [`aggregate::Aggregator`] merges sources, isolating failures
//! - **Transform**: [`transform::Transformer`] runs declarative column steps
//! - **Sink**: [`sink`] writes CSV and SQLite output
//!
//! [`pipeline::Pipeline`] runs the stages in order from a
//! [`config::PipelineConfig`]; [`presets`] ships ready-made pipelines.
//!
//! # Example
//!
//! ```no_run
//! use tabflow_ingest::pipeline::Pipeline;
//! use tabflow_ingest::presets;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = presets::load("banks")?;
//!     let report = Pipeline::from_config(config)?.run().await?;
//!     println!("{} rows loaded", report.records.len());
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod extract;
pub mod loader;
pub mod pipeline;
pub mod presets;
pub mod sink;
pub mod source;
pub mod transform;
