use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use statpipe_common::types::ReportFormat;
use uuid::Uuid;

use super::ReportRenderer;
use crate::error::{EtlError, Result};
use crate::metric::{MetricValue, Report, UnitStatus};

/// Pretty printed JSON with four-space indentation
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

#[derive(Serialize)]
struct ReportDocument<'a> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    processes: Vec<ProcessDocument<'a>>,
}

#[derive(Serialize)]
struct ProcessDocument<'a> {
    process: &'a str,
    objects: Vec<ObjectDocument<'a>>,
}

#[derive(Serialize)]
struct ObjectDocument<'a> {
    name: &'a str,
    metrics: serde_json::Map<String, serde_json::Value>,
    status: &'a UnitStatus,
}

fn to_json(value: &MetricValue) -> serde_json::Value {
    match value {
        MetricValue::Int(value) => serde_json::Value::from(*value),
        MetricValue::Text(value) => serde_json::Value::from(value.as_str()),
        MetricValue::List(values) => serde_json::Value::from(values.clone()),
    }
}

impl ReportRenderer for JsonRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }

    fn render(&self, report: &Report) -> Result<String> {
        let document = ReportDocument {
            run_id: report.run_id,
            started_at: report.started_at,
            finished_at: report.finished_at,
            processes: report
                .processes
                .iter()
                .map(|process| ProcessDocument {
                    process: process.process.as_str(),
                    objects: process
                        .objects
                        .iter()
                        .map(|metric| ObjectDocument {
                            name: &metric.name,
                            metrics: metric
                                .values()
                                .map(|(key, value)| (key.to_string(), to_json(value)))
                                .collect(),
                            status: &metric.status,
                        })
                        .collect(),
                })
                .collect(),
        };

        let mut buffer = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
        document.serialize(&mut serializer)?;
        String::from_utf8(buffer).map_err(|e| EtlError::Report(e.to_string()))
    }
}
