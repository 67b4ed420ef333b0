//! Run progress log
//!
//! A pipeline run reports milestones ("Data extraction complete...") and every
//! recoverable failure (dropped row, skipped source) as `(timestamp, message)`
//! pairs. The sink is injected, so the pipeline never owns a global log file
//! and tests can inspect exactly what was reported.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Append-only sink for progress messages.
pub trait ProgressLog: Send + Sync {
    fn record(&self, at: DateTime<Local>, message: &str);

    /// Record a message stamped with the current local time.
    fn log(&self, message: &str) {
        self.record(Local::now(), message);
    }
}

/// Line layout for [`FileProgressLog`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampStyle {
    /// `2024-01-18 09:15:02 : message`
    #[default]
    Colon,
    /// `2024-Jan-18-09:15:02, message`
    Comma,
}

impl TimestampStyle {
    pub fn format_line(self, at: DateTime<Local>, message: &str) -> String {
        match self {
            TimestampStyle::Colon => format!("{} : {}", at.format("%Y-%m-%d %H:%M:%S"), message),
            TimestampStyle::Comma => format!("{}, {}", at.format("%Y-%h-%d-%H:%M:%S"), message),
        }
    }
}

/// Appends one line per message to a text file.
///
/// The file is opened per call so an interrupted run still leaves every line
/// written so far.
#[derive(Debug, Clone)]
pub struct FileProgressLog {
    path: PathBuf,
    style: TimestampStyle,
}

impl FileProgressLog {
    pub fn new(path: impl Into<PathBuf>, style: TimestampStyle) -> Self {
        Self {
            path: path.into(),
            style,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl ProgressLog for FileProgressLog {
    fn record(&self, at: DateTime<Local>, message: &str) {
        let line = self.style.format_line(at, message);
        if let Err(e) = self.append(&line) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to append progress log"
            );
        }
    }
}

/// Forwards progress messages to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressLog;

impl ProgressLog for TracingProgressLog {
    fn record(&self, _at: DateTime<Local>, message: &str) {
        tracing::info!(target: "tabflow::progress", "{}", message);
    }
}

/// Keeps messages in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryProgressLog {
    entries: Mutex<Vec<(DateTime<Local>, String)>>,
}

impl MemoryProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.iter().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default()
    }

    /// Messages containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.contains(needle))
            .collect()
    }
}

impl ProgressLog for MemoryProgressLog {
    fn record(&self, at: DateTime<Local>, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((at, message.to_string()));
        }
    }
}

/// Sends every message to several sinks with one timestamp.
#[derive(Default, Clone)]
pub struct FanoutProgressLog {
    sinks: Vec<Arc<dyn ProgressLog>>,
}

impl FanoutProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressLog>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressLog for FanoutProgressLog {
    fn record(&self, at: DateTime<Local>, message: &str) {
        for sink in &self.sinks {
            sink.record(at, message);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 18, 9, 15, 2).unwrap()
    }

    #[test]
    fn test_colon_style() {
        let line = TimestampStyle::Colon.format_line(fixed_time(), "Process Complete");
        assert_eq!(line, "2024-01-18 09:15:02 : Process Complete");
    }

    #[test]
    fn test_comma_style() {
        let line = TimestampStyle::Comma.format_line(fixed_time(), "ETL Job Started");
        assert_eq!(line, "2024-Jan-18-09:15:02, ETL Job Started");
    }

    #[test]
    fn test_file_log_appends_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("code_log.txt");
        let log = FileProgressLog::new(&path, TimestampStyle::Colon);

        log.record(fixed_time(), "first");
        log.record(fixed_time(), "second");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" : first"));
        assert!(lines[1].ends_with(" : second"));
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemoryProgressLog::new());
        let b = Arc::new(MemoryProgressLog::new());
        let fanout = FanoutProgressLog::new().with(a.clone()).with(b.clone());

        fanout.log("hello");

        assert_eq!(a.messages(), vec!["hello"]);
        assert_eq!(b.matching("hell"), vec!["hello"]);
    }
}
