use std::path::{Path, PathBuf};

use crate::error::{Result, SamplerError};
use crate::pipeline::processing::Summary;
use crate::types::Table;

use super::{summary_headers, write_all_atomically, Report, ReportSink};

/// Three sibling CSV files named after the output path's stem
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

impl CsvExporter {
    /// Paths the sections are written to for a given output path
    pub fn section_paths(path: &Path) -> [PathBuf; 3] {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("final_sample_with_summary");
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        [
            dir.join(format!("{stem}_final_sample.csv")),
            dir.join(format!("{stem}_category_summary.csv")),
            dir.join(format!("{stem}_user_profile_summary.csv")),
        ]
    }
}

impl ReportSink for CsvExporter {
    fn write(&self, report: &Report<'_>, path: &Path) -> Result<Vec<PathBuf>> {
        let [sample_path, category_path, user_path] = Self::section_paths(path);

        // Render everything before touching the disk
        let sample = render_table(report.final_sample)?;
        let category = render_summary(report.category_summary)?;
        let users = render_summary(report.user_profile_summary)?;

        write_all_atomically(&[
            (sample_path.as_path(), sample.as_slice()),
            (category_path.as_path(), category.as_slice()),
            (user_path.as_path(), users.as_slice()),
        ])?;
        Ok(vec![sample_path, category_path, user_path])
    }
}

fn finish(writer: ::csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer.into_inner().map_err(|e| SamplerError::Export {
        message: e.to_string(),
    })
}

fn render_table(table: &Table) -> Result<Vec<u8>> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.key().into_owned()))?;
    }
    finish(writer)
}

fn render_summary(summary: &Summary) -> Result<Vec<u8>> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(summary_headers(summary))?;
    for row in &summary.rows {
        let ratio = if row.ratio.is_finite() {
            row.ratio.to_string()
        } else {
            String::new()
        };
        writer.write_record([
            row.key.clone(),
            row.sample_count.to_string(),
            row.total_count.to_string(),
            ratio,
        ])?;
    }
    finish(writer)
}
