use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet could not be read: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("Workbook could not be written: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid exclusion pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: '{0}'")]
    MissingColumn(String),

    #[error("Input file is empty: {0}")]
    EmptyInput(String),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Export failed: {message}")]
    Export { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SamplerError {
    /// Whether the error was caused by the uploaded data rather than the environment
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SamplerError::Csv(_)
                | SamplerError::Xlsx(_)
                | SamplerError::MissingColumn(_)
                | SamplerError::EmptyInput(_)
                | SamplerError::UnsupportedFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SamplerError>;
