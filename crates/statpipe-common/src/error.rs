//! Error types shared across statpipe crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid save file type: {0}. Valid types: excel, csv")]
    InvalidSaveFileType(String),

    #[error("Invalid report format: {0}. Valid formats: text, markdown, json, csv, xml")]
    InvalidReportFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
