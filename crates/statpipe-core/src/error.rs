//! Error types for pipeline units
//!
//! Every failure a unit can hit maps onto one [`ErrorKind`], which is what the
//! pipeline uses to decide between failing fast (configuration) and isolating
//! the failure to the unit that raised it (everything else).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource not found: {name} ({url}) returned HTTP {status}")]
    ResourceNotFound {
        name: String,
        url: String,
        status: u16,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Input precondition failed for {}: {reason}", path.display())]
    InputPrecondition { path: PathBuf, reason: String },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Missing column '{column}' in {context}")]
    MissingColumn { column: String, context: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Coarse classification of [`EtlError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Network,
    InputPrecondition,
    Format,
    Io,
    Cancelled,
    Internal,
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::Config(_) => ErrorKind::Configuration,
            EtlError::ResourceNotFound { .. } | EtlError::Http(_) => ErrorKind::Network,
            EtlError::InputPrecondition { .. } => ErrorKind::InputPrecondition,
            EtlError::Format(_)
            | EtlError::MissingColumn { .. }
            | EtlError::Csv(_)
            | EtlError::Spreadsheet(_)
            | EtlError::Archive(_)
            | EtlError::Serialization(_) => ErrorKind::Format,
            EtlError::Io(_) => ErrorKind::Io,
            EtlError::Cancelled => ErrorKind::Cancelled,
            EtlError::Report(_) | EtlError::WorkerPool(_) => ErrorKind::Internal,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        EtlError::Config(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        EtlError::Format(msg.into())
    }

    pub fn input_precondition(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        EtlError::InputPrecondition {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>, context: impl Into<String>) -> Self {
        EtlError::MissingColumn {
            column: column.into(),
            context: context.into(),
        }
    }

    /// Whether this error must stop the run before any phase starts
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

impl From<calamine::Error> for EtlError {
    fn from(err: calamine::Error) -> Self {
        EtlError::Spreadsheet(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for EtlError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        EtlError::Spreadsheet(err.to_string())
    }
}

impl From<std::fmt::Error> for EtlError {
    fn from(err: std::fmt::Error) -> Self {
        EtlError::Report(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(EtlError::config("bad key").kind(), ErrorKind::Configuration);
        assert!(EtlError::config("bad key").is_fatal());
        assert_eq!(
            EtlError::ResourceNotFound {
                name: "b.csv".into(),
                url: "http://localhost/b".into(),
                status: 404
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(
            EtlError::input_precondition("/missing", "not found").kind(),
            ErrorKind::InputPrecondition
        );
        assert_eq!(EtlError::missing_column("year", "merge").kind(), ErrorKind::Format);
        assert!(!EtlError::Cancelled.is_fatal());
        assert_eq!(EtlError::from(std::fmt::Error).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = EtlError::ResourceNotFound {
            name: "b.csv".into(),
            url: "http://localhost/b".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Resource not found: b.csv (http://localhost/b) returned HTTP 404"
        );

        let err = EtlError::input_precondition("/data/gti/extracted", "directory does not exist");
        assert!(err.to_string().contains("/data/gti/extracted"));
    }
}
