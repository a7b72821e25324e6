//! Report rendering
//!
//! A [`Report`] renders to plain text, Markdown, JSON, CSV or XML. Every
//! renderer walks the same process → object → metric tree, lists the unit
//! status as a final `status` entry, and accepts an empty report.
//!
//! # Example
//!
//! ```no_run
//! use statpipe_common::types::ReportFormat;
//! use statpipe_core::metric::Report;
//! use statpipe_core::report::{render, write_report};
//!
//! # fn main() -> statpipe_core::Result<()> {
//! let report = Report::new();
//! println!("{}", render(&report, ReportFormat::Markdown)?);
//! write_report(&report, ReportFormat::Json, "reports".as_ref())?;
//! # Ok(())
//! # }
//! ```

mod json;
mod markdown;
mod tabular;
mod text;
mod xml;

use statpipe_common::types::ReportFormat;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::metric::{Metric, Report};

pub use json::JsonRenderer;
pub use markdown::MarkdownRenderer;
pub use tabular::CsvRenderer;
pub use text::TextRenderer;
pub use xml::XmlRenderer;

/// Key under which the unit status is rendered
pub const STATUS_KEY: &str = "status";

pub trait ReportRenderer: Send + Sync {
    fn format(&self) -> ReportFormat;

    fn render(&self, report: &Report) -> Result<String>;
}

pub fn renderer(format: ReportFormat) -> Box<dyn ReportRenderer> {
    match format {
        ReportFormat::Text => Box::new(TextRenderer),
        ReportFormat::Markdown => Box::new(MarkdownRenderer),
        ReportFormat::Json => Box::new(JsonRenderer),
        ReportFormat::Csv => Box::new(CsvRenderer),
        ReportFormat::Xml => Box::new(XmlRenderer),
    }
}

pub fn render(report: &Report, format: ReportFormat) -> Result<String> {
    renderer(format).render(report)
}

/// Render `report` into `{dir}/report.{ext}`
pub fn write_report(report: &Report, format: ReportFormat, dir: &Path) -> Result<PathBuf> {
    let rendered = render(report, format)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format.default_filename());
    std::fs::write(&path, rendered)?;
    info!(format = %format, path = %path.display(), "Wrote report");
    Ok(path)
}

/// Metric entries of one unit as display strings, status last
pub(crate) fn entries(metric: &Metric) -> Vec<(String, String)> {
    metric
        .values()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .chain(std::iter::once((
            STATUS_KEY.to_string(),
            metric.status.to_string(),
        )))
        .collect()
}
