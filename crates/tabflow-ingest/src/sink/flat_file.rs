//! CSV file sink

use std::io::Write;
use std::path::Path;
use tabflow_common::types::RecordSet;
use tracing::info;

use super::SinkError;

/// Write the header and one line per record.
///
/// Numbers use their display form (`20000.0`); `Absent` cells are empty.
pub fn write_csv<W: Write>(writer: W, records: &RecordSet) -> Result<(), SinkError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(records.schema().columns())?;
    for row in records {
        out.write_record(row.values().map(|v| v.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

/// Write `records` to `path`, replacing any existing file.
pub fn write_csv_file(path: &Path, records: &RecordSet) -> Result<(), SinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), records)?;

    info!(path = %path.display(), rows = records.len(), "Wrote CSV output");
    Ok(())
}
