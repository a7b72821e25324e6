use statpipe_common::types::ReportFormat;
use std::fmt::Write;

use super::{entries, ReportRenderer};
use crate::error::Result;
use crate::metric::Report;

/// Indented plain text, one line per metric
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl ReportRenderer for TextRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Text
    }

    fn render(&self, report: &Report) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "Run: {}", report.run_id)?;
        for process in &report.processes {
            writeln!(out, "Process: {}", process.process)?;
            for metric in &process.objects {
                writeln!(out, "\tObject Name: {}", metric.name)?;
                for (key, value) in entries(metric) {
                    writeln!(out, "\t\t{}: {}", key, value)?;
                }
            }
        }
        Ok(out)
    }
}
