use statpipe_common::types::ReportFormat;
use std::fmt::Write;

use super::{entries, ReportRenderer};
use crate::error::Result;
use crate::metric::Report;

/// Markdown headings per process and object, bullets per metric
///
/// Unit names and metric keys are escaped; metric values are rendered as code
/// spans so failure messages show up verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRenderer;

impl ReportRenderer for MarkdownRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Markdown
    }

    fn render(&self, report: &Report) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "# ETL Report")?;
        writeln!(out)?;
        writeln!(out, "- **run_id**: `{}`", report.run_id)?;
        writeln!(out, "- **started_at**: {}", report.started_at.to_rfc3339())?;
        if let Some(finished_at) = report.finished_at {
            writeln!(out, "- **finished_at**: {}", finished_at.to_rfc3339())?;
        }

        for process in &report.processes {
            writeln!(out)?;
            writeln!(out, "## Process: {}", process.process)?;
            if process.objects.is_empty() {
                writeln!(out)?;
                writeln!(out, "_No units._")?;
            }
            for metric in &process.objects {
                writeln!(out)?;
                writeln!(out, "### Object Name: {}", escape(&metric.name))?;
                writeln!(out)?;
                for (key, value) in entries(metric) {
                    writeln!(out, "- **{}**: {}", escape(&key), code_span(&value))?;
                }
            }
        }
        Ok(out)
    }
}

/// Backslash-escape inline Markdown syntax
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '|') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Wrap `text` in a code span whose fence is longer than any backtick run inside it
fn code_span(text: &str) -> String {
    let longest_run = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}
