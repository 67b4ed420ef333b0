//! Source discovery
//!
//! Lists the data files of one directory as [`SourceDescriptor`]s. Only the
//! top level is scanned; files are grouped by format (CSV, then JSON, then
//! XML) and sorted by name within each group.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::source::{CsvSpec, JsonSpec, SourceDescriptor, SourceFormat, XmlSpec};

/// Extensions read as JSON or JSON Lines
const JSON_EXTENSIONS: &[&str] = &["json", "jsonl", "ndjson"];

/// Where to look and how to read each format found there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySettings {
    pub dir: PathBuf,

    #[serde(default)]
    pub csv: CsvSpec,

    #[serde(default)]
    pub json: JsonSpec,

    /// XML files are skipped unless their row layout is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml: Option<XmlSpec>,

    /// File names to leave out, e.g. an output file written into the same directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl DiscoverySettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            csv: CsvSpec::default(),
            json: JsonSpec::default(),
            xml: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_xml(mut self, xml: XmlSpec) -> Self {
        self.xml = Some(xml);
        self
    }

    pub fn excluding(mut self, file_name: impl Into<String>) -> Self {
        self.exclude.push(file_name.into());
        self
    }
}

/// Group a file by extension; `None` for files that are not data sources.
fn format_rank(path: &Path) -> Option<u8> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Some(0),
        e if JSON_EXTENSIONS.contains(&e) => Some(1),
        "xml" => Some(2),
        _ => None,
    }
}

/// List the data files in `settings.dir`.
pub fn discover(settings: &DiscoverySettings) -> Result<Vec<SourceDescriptor>, walkdir::Error> {
    let mut found = Vec::new();

    for entry in WalkDir::new(&settings.dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if settings.exclude.iter().any(|e| *e == name) {
            debug!(file = %name, "Excluded from discovery");
            continue;
        }

        let Some(rank) = format_rank(entry.path()) else {
            continue;
        };
        let format = match rank {
            0 => SourceFormat::Csv(settings.csv.clone()),
            1 => SourceFormat::Json(settings.json.clone()),
            _ => match &settings.xml {
                Some(xml) => SourceFormat::Xml(xml.clone()),
                None => {
                    debug!(file = %name, "No XML layout configured, skipping");
                    continue;
                },
            },
        };

        found.push((rank, SourceDescriptor::file(entry.into_path(), format)));
    }

    // stable: name order survives within each group
    found.sort_by_key(|(rank, _)| *rank);

    info!(dir = %settings.dir.display(), sources = found.len(), "Discovered sources");
    Ok(found.into_iter().map(|(_, d)| d).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn test_grouped_by_format_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let names = ["used_car_b.xml", "used_car_a.json", "b.csv", "a.csv", "notes.txt", "c.jsonl"];
        for name in names {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "deep.csv");

        let settings = DiscoverySettings::new(dir.path())
            .with_xml(XmlSpec::new("record", ["car_model"]));
        let found = discover(&settings).unwrap();

        let names: Vec<_> = found
            .iter()
            .map(|d| match &d.location {
                crate::source::SourceLocation::File(p) => {
                    p.file_name().unwrap().to_string_lossy().into_owned()
                },
                other => panic!("unexpected location {}", other),
            })
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv", "c.jsonl", "used_car_a.json", "used_car_b.xml"]);
        assert_eq!(found[4].format.name(), "xml");
    }

    #[test]
    fn test_exclude_and_unconfigured_xml() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "transformed_data.csv");
        touch(dir.path(), "source.csv");
        touch(dir.path(), "source.xml");

        let settings = DiscoverySettings::new(dir.path()).excluding("transformed_data.csv");
        let found = discover(&settings).unwrap();

        assert_eq!(found.len(), 1);
        assert!(found[0].id.ends_with("source.csv"));
    }

    #[test]
    fn test_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DiscoverySettings::new(dir.path().join("absent"));
        assert!(discover(&settings).is_err());
    }
}
