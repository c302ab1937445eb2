// Pipeline export: write the final sample and both summaries to disk or to bytes

pub mod csv;
pub mod xlsx;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{PERCENTAGE_HEADER, SAMPLE_COUNT_HEADER, TOTAL_VOLUME_HEADER};
use crate::error::{Result, SamplerError};
use crate::pipeline::processing::Summary;
use crate::types::Table;

pub use self::csv::CsvExporter;
pub use self::xlsx::XlsxExporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Xlsx => write!(f, "xlsx"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// The three sections every export contains
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub final_sample: &'a Table,
    pub category_summary: &'a Summary,
    pub user_profile_summary: &'a Summary,
}

/// Destination for a finished run
pub trait ReportSink {
    /// Write `report` at or next to `path`, returning every file produced
    fn write(&self, report: &Report<'_>, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Pick the sink for an output format
pub fn exporter_for(format: OutputFormat) -> Box<dyn ReportSink> {
    match format {
        OutputFormat::Xlsx => Box::new(XlsxExporter),
        OutputFormat::Csv => Box::new(CsvExporter),
    }
}

/// Header row of a summary section
pub(crate) fn summary_headers(summary: &Summary) -> [&str; 4] {
    [
        summary.key_header.as_str(),
        SAMPLE_COUNT_HEADER,
        TOTAL_VOLUME_HEADER,
        PERCENTAGE_HEADER,
    ]
}

/// Write `bytes` to `<path>.partial`, then rename over `path`.
///
/// The final name only ever holds a complete file; on failure the partial file is removed.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    write_all_atomically(&[(path, bytes)])
}

/// Write every `(path, bytes)` pair as one unit.
///
/// All `.partial` files are written before any rename. If a write or rename fails,
/// every partial file and every file already renamed by this call is removed, so
/// either all sections appear under their final names or none do.
pub(crate) fn write_all_atomically(files: &[(&Path, &[u8])]) -> Result<()> {
    for (path, _) in files {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| export_error(parent, e))?;
        }
    }

    let partials: Vec<PathBuf> = files.iter().map(|(path, _)| partial_path(path)).collect();

    for ((path, bytes), partial) in files.iter().zip(&partials) {
        if let Err(e) = fs::write(partial, bytes) {
            discard(&partials, &[]);
            return Err(export_error(path, e));
        }
    }

    let mut renamed: Vec<&Path> = Vec::with_capacity(files.len());
    for ((path, bytes), partial) in files.iter().zip(&partials) {
        if let Err(e) = fs::rename(partial, path) {
            warn!("rolling back export after failure on {}", path.display());
            discard(&partials, &renamed);
            return Err(export_error(path, e));
        }
        renamed.push(*path);
        debug!("wrote {} bytes to {}", bytes.len(), path.display());
    }

    for (path, _) in files {
        info!("💾 Saved {}", path.display());
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    PathBuf::from(partial)
}

fn discard(partials: &[PathBuf], renamed: &[&Path]) {
    for path in partials.iter().map(PathBuf::as_path).chain(renamed.iter().copied()) {
        let _ = fs::remove_file(path);
    }
}

fn export_error(path: &Path, e: std::io::Error) -> SamplerError {
    SamplerError::Export {
        message: format!("{}: {}", path.display(), e),
    }
}
