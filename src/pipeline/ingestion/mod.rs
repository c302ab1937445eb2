// Pipeline ingestion: turn uploaded bytes or a file on disk into a validated table

pub mod csv;
pub mod xlsx;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::config::ColumnNames;
use crate::error::{Result, SamplerError};
use crate::types::{ColumnMap, Table};

/// Supported input encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Xlsx,
    Csv,
}

impl InputFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for InputFormat {
    type Err = SamplerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "xlsm" => Ok(InputFormat::Xlsx),
            "csv" => Ok(InputFormat::Csv),
            other => Err(SamplerError::UnsupportedFormat(format!(
                "'{}' (expected xlsx or csv)",
                other
            ))),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Xlsx => write!(f, "xlsx"),
            InputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// A parsed input whose required columns are known to exist
#[derive(Debug, Clone)]
pub struct LoadedInput {
    pub table: Table,
    pub columns: ColumnMap,
    pub format: InputFormat,
    /// Hex SHA-256 of the raw input bytes
    pub digest: String,
}

/// Parse `bytes` as `format` and validate the required columns
#[instrument(skip(bytes, names), fields(bytes = bytes.len(), format = %format))]
pub fn load_bytes(bytes: &[u8], format: InputFormat, names: &ColumnNames) -> Result<LoadedInput> {
    if bytes.is_empty() {
        return Err(SamplerError::EmptyInput("no bytes received".to_string()));
    }

    let table = match format {
        InputFormat::Xlsx => xlsx::read_table(bytes)?,
        InputFormat::Csv => csv::read_table(bytes)?,
    };

    if table.headers().is_empty() {
        return Err(SamplerError::EmptyInput("no header row".to_string()));
    }
    let columns = ColumnMap::resolve(&table, names)?;
    if table.is_empty() {
        return Err(SamplerError::EmptyInput("header row but no data rows".to_string()));
    }

    let digest = hex::encode(Sha256::digest(bytes));
    info!(
        "Loaded {} rows x {} columns (sha256 {})",
        table.len(),
        table.headers().len(),
        &digest[..12]
    );

    Ok(LoadedInput {
        table,
        columns,
        format,
        digest,
    })
}

/// Read a file from disk, choosing the parser by extension
pub fn load_path(path: &Path, names: &ColumnNames) -> Result<LoadedInput> {
    let format = InputFormat::from_path(path)?;
    let bytes = fs::read(path)?;
    load_bytes(&bytes, format, names)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "User Profile,Changed Using,Module,External Code,Notes\n";

    #[test]
    fn test_format_from_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a/b.XLSX")).unwrap(), InputFormat::Xlsx);
        assert_eq!(InputFormat::from_path(Path::new("b.csv")).unwrap(), InputFormat::Csv);
        assert!(matches!(
            InputFormat::from_path(Path::new("b.xls")),
            Err(SamplerError::UnsupportedFormat(_))
        ));
        assert!(InputFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_load_csv_resolves_columns() {
        let data = format!("{HEADER}alice,Manual,BEER,C1,first\n");
        let loaded = load_bytes(data.as_bytes(), InputFormat::Csv, &ColumnNames::default()).unwrap();
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(loaded.columns.module, 2);
        assert_eq!(loaded.digest.len(), 64);
    }

    #[test]
    fn test_empty_bytes_rejected() {
        let err = load_bytes(b"", InputFormat::Csv, &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, SamplerError::EmptyInput(_)));
    }

    #[test]
    fn test_header_only_rejected() {
        let err = load_bytes(HEADER.as_bytes(), InputFormat::Csv, &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, SamplerError::EmptyInput(_)));
    }

    #[test]
    fn test_missing_column_named_in_error() {
        let data = "User Profile,Module,External Code\nalice,BEER,C1\n";
        let err = load_bytes(data.as_bytes(), InputFormat::Csv, &ColumnNames::default()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required column: 'Changed Using'");
    }

    #[test]
    fn test_garbage_is_not_a_workbook() {
        let err = load_bytes(b"definitely not a zip", InputFormat::Xlsx, &ColumnNames::default())
            .unwrap_err();
        assert!(err.is_input_error());
    }
}
