//! Common types used across statpipe

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Tabular output format written by transformers and loaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveFileType {
    /// Excel workbook (`.xlsx`)
    #[default]
    Excel,
    /// Comma separated values (`.csv`)
    Csv,
}

impl SaveFileType {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFileType::Excel => "xlsx",
            SaveFileType::Csv => "csv",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaveFileType::Excel => "excel",
            SaveFileType::Csv => "csv",
        }
    }
}

impl std::fmt::Display for SaveFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SaveFileType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "excel" | "xlsx" => Ok(SaveFileType::Excel),
            "csv" => Ok(SaveFileType::Csv),
            _ => Err(CommonError::InvalidSaveFileType(s.to_string())),
        }
    }
}

/// Supported run report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Indented plain text
    #[default]
    Text,
    /// Markdown headings and bullet lists
    Markdown,
    /// Pretty printed JSON document
    Json,
    /// Flat `process,object,metric,value` table
    Csv,
    /// Nested `<report>` document
    Xml,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 5] = [
        ReportFormat::Text,
        ReportFormat::Markdown,
        ReportFormat::Json,
        ReportFormat::Csv,
        ReportFormat::Xml,
    ];

    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Xml => "xml",
        }
    }

    /// Get format name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Text => "text",
            ReportFormat::Markdown => "markdown",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Xml => "xml",
        }
    }

    /// Default file name for a report in this format
    pub fn default_filename(&self) -> String {
        format!("report.{}", self.extension())
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "xml" => Ok(ReportFormat::Xml),
            _ => Err(CommonError::InvalidReportFormat(s.to_string())),
        }
    }
}
