//! CSV export of buffered samples

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use ecg_core::TestProfile;
use ecg_processing::ExportTable;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for an export taken at `now`, e.g. `ecg_twelvelead_2024-05-01_14-03-22.csv`
pub fn export_filename(profile: TestProfile, now: DateTime<Local>) -> String {
    format!(
        "ecg_{}_{}.csv",
        format!("{:?}", profile).to_lowercase(),
        now.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Write the header and every row; returns the number of data rows written
pub fn write_table<W: Write>(table: &ExportTable, writer: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(table.header())?;

    for (index, values) in &table.rows {
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(index.to_string());
        record.extend(values.iter().map(|value| value.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(table.rows.len())
}

/// Export into `dir` under a timestamped name and return the file path
pub fn export_to_dir(table: &ExportTable, dir: &Path, profile: TestProfile) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create export directory {}", dir.display()))?;

    let path = dir.join(export_filename(profile, Local::now()));
    let file =
        File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
    let rows = write_table(table, file)?;

    info!(path = %path.display(), rows, "samples exported");
    Ok(path)
}
