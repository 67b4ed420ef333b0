//! Pipeline orchestration
//!
//! Runs one configured pipeline end to end: extract every source, transform
//! the aggregate, then write the flat file and the database table. Stages
//! are strictly sequential; nothing is written unless extraction and
//! transformation both succeed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabflow_common::progress::{FanoutProgressLog, FileProgressLog, TracingProgressLog};
use tabflow_common::types::RecordSet;
use tabflow_common::{ErrorKind, ProgressLog};
use tracing::{debug, info};

use crate::aggregate::{AggregateError, Aggregator, ExtractionOutcome, SourceFailure};
use crate::config::{ConfigError, PipelineConfig};
use crate::discovery;
use crate::loader::{DefaultLoader, LoadError, SourceLoader};
use crate::sink::{self, SinkError, SqliteSink};
use crate::transform::{ExchangeRates, TransformError, Transformer};

// ============================================================================
// Milestones
// ============================================================================

pub const MSG_PRELIMINARIES: &str = "Preliminaries complete. Initiating ETL process";
pub const MSG_EXTRACTED: &str = "Data extraction complete. Initiating Transformation process";
pub const MSG_TRANSFORMED: &str = "Data transformation complete. Initiating Loading process";
pub const MSG_CSV_SAVED: &str = "Data saved to CSV file";
pub const MSG_SQL_CONNECTED: &str = "SQL Connection initiated";
pub const MSG_TABLE_LOADED: &str = "Data loaded to Database as a table, Executing queries";
pub const MSG_COMPLETE: &str = "Process Complete";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("load failed: {0}")]
    Sink(#[from] SinkError),
}

impl PipelineError {
    /// Failure category, for errors that have one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineError::Aggregate(e) => Some(e.kind()),
            PipelineError::Load(_) => Some(ErrorKind::SourceUnavailable),
            _ => None,
        }
    }
}

/// Output of an inspection query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub sql: String,
    pub records: RecordSet,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: RecordSet,
    pub failures: Vec<SourceFailure>,
    pub dropped_rows: usize,
    pub csv_path: Option<PathBuf>,
    pub table_rows: Option<u64>,
    pub queries: Vec<QueryOutput>,
    pub duration: Duration,
}

pub struct Pipeline {
    config: PipelineConfig,
    loader: Arc<dyn SourceLoader>,
    progress: Arc<dyn ProgressLog>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        loader: Arc<dyn SourceLoader>,
        progress: Arc<dyn ProgressLog>,
    ) -> Self {
        Self {
            config,
            loader,
            progress,
        }
    }

    /// Validate the configuration and wire the default loader and progress
    /// log (tracing, plus the configured file if any).
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let loader = DefaultLoader::new(Duration::from_secs(config.fetch_timeout_secs))?;

        let mut progress = FanoutProgressLog::new().with(Arc::new(TracingProgressLog));
        let style = config.progress_log.as_ref().map(|log| log.style);
        if let (Some(path), Some(style)) = (config.progress_log_path(), style) {
            progress = progress.with(Arc::new(FileProgressLog::new(path, style)));
        }

        Ok(Self::new(config, Arc::new(loader), Arc::new(progress)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        info!(pipeline = %self.config.name, "Starting pipeline");
        self.progress.log(MSG_PRELIMINARIES);

        // Extract
        let aggregator = Aggregator::new(self.config.target_schema.clone(), self.progress.clone());
        let mut outcomes = Vec::new();
        let mut descriptors = self.config.descriptors();
        if let Some(settings) = self.config.discovery() {
            match discovery::discover(&settings) {
                Ok(found) => descriptors.extend(found),
                Err(e) => {
                    let dir = settings.dir.display().to_string();
                    let failure =
                        SourceFailure::new(&dir, ErrorKind::SourceUnavailable, e.to_string());
                    outcomes.push((dir, ExtractionOutcome::Failed(failure)));
                },
            }
        }
        outcomes.extend(
            aggregator
                .load_all(&descriptors, self.loader.as_ref(), self.config.concurrency)
                .await,
        );
        let aggregation = aggregator.aggregate(outcomes)?;
        info!(
            rows = aggregation.records.len(),
            failed_sources = aggregation.failures.len(),
            dropped_rows = aggregation.dropped_rows,
            "Extraction complete"
        );
        self.progress.log(MSG_EXTRACTED);

        // Transform
        let rates = self.exchange_rates().await?;
        let records = Transformer::new(self.config.transforms.clone())
            .with_rates(rates)
            .with_progress(self.progress.clone())
            .apply(aggregation.records)?;
        self.progress.log(MSG_TRANSFORMED);

        // Load
        let csv_path = self.config.csv_path();
        if let Some(path) = &csv_path {
            sink::write_csv_file(path, &records)?;
            self.progress.log(MSG_CSV_SAVED);
        }

        let mut table_rows = None;
        let mut queries = Vec::new();
        let table = self.config.output.table.as_deref();
        if let (Some(database), Some(table)) = (self.config.database(), table) {
            let db = SqliteSink::connect(&database).await?;
            self.progress.log(MSG_SQL_CONNECTED);

            table_rows = Some(db.replace_table(table, &records).await?);
            self.progress.log(MSG_TABLE_LOADED);

            for sql in &self.config.queries {
                debug!(sql = %sql, "Executing query");
                queries.push(QueryOutput {
                    sql: sql.clone(),
                    records: db.query(sql).await?,
                });
            }
            db.close().await;
        }

        self.progress.log(MSG_COMPLETE);
        let duration = started.elapsed();
        info!(
            pipeline = %self.config.name,
            rows = records.len(),
            duration_secs = duration.as_secs_f64(),
            "Pipeline complete"
        );

        Ok(RunReport {
            records,
            failures: aggregation.failures,
            dropped_rows: aggregation.dropped_rows,
            csv_path,
            table_rows,
            queries,
            duration,
        })
    }

    /// Table rates first, then inline rates on top.
    async fn exchange_rates(&self) -> Result<ExchangeRates, PipelineError> {
        let Some(settings) = &self.config.exchange_rates else {
            return Ok(ExchangeRates::new());
        };

        let mut rates = match self.config.rates_location() {
            Some(location) => {
                let content = self.loader.load(&location).await?;
                ExchangeRates::from_csv(&content)?
            },
            None => ExchangeRates::new(),
        };
        rates.merge(settings.rates.clone());
        debug!(currencies = rates.len(), "Exchange rates ready");
        Ok(rates)
    }
}
