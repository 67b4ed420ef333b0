//! tabflow - tabular ETL pipelines

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use std::path::PathBuf;
use tabflow_common::logging::{init_logging, LogConfig, LogLevel};
use tabflow_common::RecordSet;
use tabflow_ingest::config::PipelineConfig;
use tabflow_ingest::pipeline::Pipeline;
use tabflow_ingest::presets;
use tabflow_ingest::sink::SqliteSink;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tabflow")]
#[command(author, version, about = "Extract, transform and load tabular data")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a pipeline from a TOML file or a built-in preset
    Run {
        /// Pipeline definition file
        #[arg(short, long, conflicts_with = "preset", required_unless_present = "preset")]
        config: Option<PathBuf>,

        /// Built-in pipeline (banks, vehicles, films)
        #[arg(short, long)]
        preset: Option<String>,

        /// Base directory for relative source paths
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory for output files
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// List presets, or print one as TOML
    Presets {
        name: Option<String>,
    },

    /// Run a SQL statement against a database written by a pipeline
    Query {
        #[arg(short, long)]
        database: String,

        #[arg(short, long)]
        sql: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("tabflow")
        .build()
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Run {
            config,
            preset,
            data_dir,
            output_dir,
        } => {
            let mut pipeline = match (config, preset) {
                (Some(path), _) => PipelineConfig::from_file(&path)
                    .with_context(|| format!("Failed to load pipeline {}", path.display()))?,
                (None, Some(name)) => presets::load(&name)?,
                (None, None) => anyhow::bail!("pass --config or --preset"),
            };
            pipeline.apply_env();
            if data_dir.is_some() {
                pipeline.data_dir = data_dir;
            }
            if output_dir.is_some() {
                pipeline.output.dir = output_dir;
            }

            let name = pipeline.name.clone();
            let report = Pipeline::from_config(pipeline)?
                .run()
                .await
                .with_context(|| format!("Pipeline {} failed", name))?;

            for output in &report.queries {
                println!("\n{}", output.sql);
                println!("{}", render(&output.records));
            }
            if !report.failures.is_empty() {
                println!("\nSkipped sources:");
                for failure in &report.failures {
                    println!("  {}", failure);
                }
            }
            info!(
                rows = report.records.len(),
                dropped_rows = report.dropped_rows,
                "Run finished"
            );
        },
        Command::Presets { name: None } => {
            for name in presets::NAMES {
                println!("{}", name);
            }
        },
        Command::Presets { name: Some(name) } => {
            print!("{}", presets::source(&name)?);
        },
        Command::Query { database, sql } => {
            let db = SqliteSink::connect(&database)
                .await
                .with_context(|| format!("Failed to open {}", database))?;
            let records = db.query(&sql).await?;
            println!("{}", render(&records));
            db.close().await;
        },
    }

    Ok(())
}

fn render(records: &RecordSet) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(records.schema().columns());
    for row in records {
        table.add_row(row.values().map(|v| v.to_string()));
    }
    table
}
