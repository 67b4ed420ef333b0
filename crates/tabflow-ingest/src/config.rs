//! Pipeline configuration
//!
//! A pipeline is described by one TOML file: the columns every source must
//! produce, where the sources are, the transform steps, and where the result
//! goes. Relative source paths resolve against `data_dir`; relative output
//! files resolve against `output.dir`.
//!
//! ```toml
//! name = "vehicles"
//! target_schema = ["car_model", "year_of_manufacture", "price", "fuel"]
//!
//! [discover]
//! dir = "."
//!
//! [[transforms]]
//! op = "round"
//! column = "price"
//! places = 2
//!
//! [output]
//! csv = "transformed_data.csv"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabflow_common::progress::TimestampStyle;
use tabflow_common::types::Schema;

use crate::aggregate::DEFAULT_CONCURRENCY;
use crate::discovery::DiscoverySettings;
use crate::loader::DEFAULT_FETCH_TIMEOUT_SECS;
use crate::source::{SourceDescriptor, SourceFormat, SourceLocation};
use crate::transform::{ExchangeRates, TransformStep, MAX_ROUND_PLACES};

// ============================================================================
// Environment Overrides
// ============================================================================

/// Directory for every relative output file
pub const ENV_OUTPUT_DIR: &str = "TABFLOW_OUTPUT_DIR";
/// Base directory for relative source paths
pub const ENV_DATA_DIR: &str = "TABFLOW_DATA_DIR";
/// SQLite database file or `sqlite:` URL
pub const ENV_DATABASE_URL: &str = "TABFLOW_DATABASE_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pipeline file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid pipeline {name}: {reason}")]
    Invalid { name: String, reason: String },

    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
}

/// One pipeline definition.
///
/// Scalar fields come before tables so the struct serializes to valid TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,

    /// Columns every source must produce; derived columns are added by transforms
    pub target_schema: Schema,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Statements run against the database after loading
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discover: Option<DiscoverySettings>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rates: Option<ExchangeRatesConfig>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_log: Option<ProgressLogConfig>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

/// A declared source: exactly one of `path` or `url`, plus its format table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(flatten)]
    pub format: SourceFormat,
}

/// Rates for `convert_currency` steps: a `Currency,Rate` CSV, inline values, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRatesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Inline rates; these win over the table
    #[serde(default, skip_serializing_if = "ExchangeRates::is_empty")]
    pub rates: ExchangeRates,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressLogConfig {
    pub path: PathBuf,

    #[serde(default)]
    pub style: TimestampStyle,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `TABFLOW_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output.dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.output.database = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.target_schema.is_empty() {
            return Err(invalid("target_schema must list at least one column"));
        }
        if self.sources.is_empty() && self.discover.is_none() {
            return Err(invalid("declare [[sources]] or a [discover] directory"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(invalid("fetch_timeout_secs must be at least 1"));
        }

        for source in &self.sources {
            if source.path.is_some() == source.url.is_some() {
                return Err(invalid("each source needs exactly one of path or url"));
            }
            if let SourceFormat::HtmlTable(spec) = &source.format {
                if spec.cells.is_empty() {
                    return Err(invalid("html_table sources need at least one cell mapping"));
                }
            }
        }

        if self
            .transforms
            .iter()
            .any(|s| s.places().is_some_and(|p| p > MAX_ROUND_PLACES))
        {
            return Err(invalid(&format!(
                "transform places must be at most {}",
                MAX_ROUND_PLACES
            )));
        }

        let converts = self
            .transforms
            .iter()
            .any(|s| matches!(s, TransformStep::ConvertCurrency { .. }));
        match &self.exchange_rates {
            None if converts => {
                return Err(invalid("convert_currency steps need an [exchange_rates] section"));
            },
            Some(rates) if rates.path.is_some() && rates.url.is_some() => {
                return Err(invalid("exchange_rates takes a path or a url, not both"));
            },
            _ => {},
        }

        if self.output.csv.is_none() && self.output.database.is_none() {
            return Err(invalid("output needs a csv file, a database, or both"));
        }
        if self.output.database.is_some() != self.output.table.is_some() {
            return Err(invalid("output.database and output.table go together"));
        }
        if !self.queries.is_empty() && self.output.database.is_none() {
            return Err(invalid("queries need an output database"));
        }

        Ok(())
    }

    /// Resolve a source path against `data_dir`.
    pub fn data_path(&self, path: &Path) -> PathBuf {
        match &self.data_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Resolve an output file against `output.dir`.
    pub fn output_path(&self, path: &Path) -> PathBuf {
        match &self.output.dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn csv_path(&self) -> Option<PathBuf> {
        self.output.csv.as_deref().map(|p| self.output_path(p))
    }

    /// Database location; `sqlite:` URLs are passed through untouched.
    pub fn database(&self) -> Option<String> {
        let database = self.output.database.as_deref()?;
        if database.starts_with("sqlite:") {
            Some(database.to_string())
        } else {
            Some(self.output_path(Path::new(database)).display().to_string())
        }
    }

    pub fn progress_log_path(&self) -> Option<PathBuf> {
        self.progress_log.as_ref().map(|p| self.output_path(&p.path))
    }

    /// Declared sources, in declaration order.
    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.sources
            .iter()
            .map(|source| {
                let location = match (&source.path, &source.url) {
                    (Some(path), _) => SourceLocation::File(self.data_path(path)),
                    (None, Some(url)) => SourceLocation::Url(url.clone()),
                    (None, None) => SourceLocation::File(PathBuf::new()),
                };
                let id = source.id.clone().unwrap_or_else(|| location.to_string());
                SourceDescriptor::new(id, location, source.format.clone())
            })
            .collect()
    }

    /// Discovery settings with the directory resolved against `data_dir`.
    pub fn discovery(&self) -> Option<DiscoverySettings> {
        self.discover.as_ref().map(|settings| DiscoverySettings {
            dir: self.data_path(&settings.dir),
            ..settings.clone()
        })
    }

    /// Exchange-rate table location, if the rates come from a file or URL.
    pub fn rates_location(&self) -> Option<SourceLocation> {
        let rates = self.exchange_rates.as_ref()?;
        match (&rates.path, &rates.url) {
            (Some(path), _) => Some(SourceLocation::File(self.data_path(path))),
            (None, Some(url)) => Some(SourceLocation::Url(url.clone())),
            (None, None) => None,
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
