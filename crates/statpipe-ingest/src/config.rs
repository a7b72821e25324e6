//! Configuration management
//!
//! Values come from the process environment, after loading a `.env` file when
//! one exists. Command-line flags override them in the binary.

use statpipe_common::types::{ReportFormat, SaveFileType};
use statpipe_core::dirs::DEFAULT_DATA_ROOT;
use statpipe_core::extract::{DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_REQUEST_TIMEOUT_SECS};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{IngestError, Result};
use crate::gti::{DEFAULT_END_YEAR, DEFAULT_START_YEAR, DEFAULT_UPLOAD_YEAR};
use crate::sources::{parse_sources, Source};
use crate::unctadstat::DEFAULT_VARIABLES;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default directory for rendered reports.
pub const DEFAULT_REPORT_DIR: &str = "reports";

/// Default report formats written after a run.
pub const DEFAULT_REPORT_FORMATS: [ReportFormat; 3] =
    [ReportFormat::Text, ReportFormat::Markdown, ReportFormat::Json];

/// Runtime configuration of the `statpipe` binary
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub data_root: PathBuf,
    pub save_file_type: SaveFileType,
    pub sources: Vec<Source>,
    /// Threads per transformer, `None` for one per CPU
    pub transform_workers: Option<usize>,
    pub extractor_workers: usize,
    pub http_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub report_dir: PathBuf,
    pub report_formats: Vec<ReportFormat>,
    /// Add the generic merge loader after the source loaders
    pub merge_sources: bool,
    pub show_progress: bool,
    pub gti: GtiConfig,
    /// UNCTADstat bulk download identifiers such as `US.PCI`
    pub unctad_variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtiConfig {
    pub upload_year: i32,
    pub start_year: i32,
    pub end_year: i32,
}

impl Default for GtiConfig {
    fn default() -> Self {
        Self {
            upload_year: DEFAULT_UPLOAD_YEAR,
            start_year: DEFAULT_START_YEAR,
            end_year: DEFAULT_END_YEAR,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_list<T>(list: &str) -> std::result::Result<Vec<T>, T::Err>
where
    T: FromStr,
{
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse)
        .collect()
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        Self::load_with(|_| {})
    }

    /// Like [`IngestConfig::load`], applying `overrides` before validation
    pub fn load_with(overrides: impl FnOnce(&mut Self)) -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_env()?;
        overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Read the environment over the defaults without validating
    ///
    /// Numeric variables that do not parse fall back to their default; list and
    /// format variables that do not parse are errors.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let save_file_type = match std::env::var("STATPIPE_SAVE_FORMAT") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.save_file_type,
        };

        let sources = match std::env::var("STATPIPE_SOURCES") {
            Ok(value) => parse_sources(&value)?,
            Err(_) => defaults.sources,
        };

        let report_formats = match std::env::var("STATPIPE_REPORT_FORMATS") {
            Ok(value) => parse_list(&value)?,
            Err(_) => defaults.report_formats,
        };

        let unctad_variables = match std::env::var("UNCTAD_VARIABLES") {
            Ok(value) => parse_list::<String>(&value).unwrap_or_default(),
            Err(_) => defaults.unctad_variables,
        };

        Ok(Self {
            data_root: std::env::var("STATPIPE_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_root),
            save_file_type,
            sources,
            transform_workers: env_parse("STATPIPE_WORKERS").or(defaults.transform_workers),
            extractor_workers: env_parse("STATPIPE_EXTRACTOR_WORKERS")
                .unwrap_or(defaults.extractor_workers),
            http_timeout_secs: env_parse("STATPIPE_HTTP_TIMEOUT")
                .unwrap_or(defaults.http_timeout_secs),
            max_concurrent_requests: env_parse("STATPIPE_MAX_CONCURRENT_REQUESTS")
                .unwrap_or(defaults.max_concurrent_requests),
            report_dir: std::env::var("STATPIPE_REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_dir),
            report_formats,
            merge_sources: env_parse("STATPIPE_MERGE_SOURCES").unwrap_or(defaults.merge_sources),
            show_progress: defaults.show_progress,
            gti: GtiConfig {
                upload_year: env_parse("GTI_UPLOAD_YEAR").unwrap_or(defaults.gti.upload_year),
                start_year: env_parse("GTI_START_YEAR").unwrap_or(defaults.gti.start_year),
                end_year: env_parse("GTI_END_YEAR").unwrap_or(defaults.gti.end_year),
            },
            unctad_variables,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(IngestError::config("at least one source must be selected"));
        }

        if self.transform_workers == Some(0) {
            return Err(IngestError::config("transformation workers must be greater than 0"));
        }

        if self.extractor_workers == 0 {
            return Err(IngestError::config("extractor workers must be greater than 0"));
        }

        if self.http_timeout_secs == 0 {
            return Err(IngestError::config("HTTP timeout must be greater than 0"));
        }

        if self.max_concurrent_requests == 0 {
            return Err(IngestError::config("max concurrent requests must be greater than 0"));
        }

        if self.gti.start_year > self.gti.end_year {
            return Err(IngestError::config(format!(
                "GTI start year ({}) cannot be after end year ({})",
                self.gti.start_year, self.gti.end_year
            )));
        }

        if self.sources.contains(&Source::UnctadStat) && self.unctad_variables.is_empty() {
            return Err(IngestError::config(
                "UNCTADstat is selected but no variables are configured",
            ));
        }

        if self.report_formats.is_empty() {
            tracing::warn!("No report formats configured - only the console report will be printed");
        }

        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            save_file_type: SaveFileType::default(),
            sources: Source::ALL.to_vec(),
            transform_workers: None,
            extractor_workers: Source::ALL.len(),
            http_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            report_formats: DEFAULT_REPORT_FORMATS.to_vec(),
            merge_sources: false,
            show_progress: false,
            gti: GtiConfig::default(),
            unctad_variables: DEFAULT_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }
}
