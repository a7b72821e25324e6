use statpipe_common::types::ReportFormat;

use super::{entries, ReportRenderer};
use crate::error::{EtlError, Result};
use crate::metric::Report;

/// One `process,object,metric,value` row per metric
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvRenderer;

pub const CSV_HEADER: [&str; 4] = ["process", "object", "metric", "value"];

impl ReportRenderer for CsvRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Csv
    }

    fn render(&self, report: &Report) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for process in &report.processes {
            for metric in &process.objects {
                for (key, value) in entries(metric) {
                    writer.write_record([process.process.as_str(), &metric.name, &key, &value])?;
                }
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| EtlError::Report(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| EtlError::Report(e.to_string()))
    }
}
