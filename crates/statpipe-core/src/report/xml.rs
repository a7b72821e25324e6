use serde::Serialize;
use statpipe_common::types::ReportFormat;

use super::{entries, ReportRenderer};
use crate::error::{EtlError, Result};
use crate::metric::Report;

/// `<report>` document with nested `<process>`, `<object>` and `<metric>` elements
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlRenderer;

#[derive(Serialize)]
#[serde(rename = "report")]
struct ReportElement {
    #[serde(rename = "@run_id")]
    run_id: String,
    #[serde(rename = "process")]
    processes: Vec<ProcessElement>,
}

#[derive(Serialize)]
struct ProcessElement {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "object")]
    objects: Vec<ObjectElement>,
}

#[derive(Serialize)]
struct ObjectElement {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "metric")]
    metrics: Vec<MetricElement>,
}

#[derive(Serialize)]
struct MetricElement {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "$text")]
    value: String,
}

impl ReportRenderer for XmlRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Xml
    }

    fn render(&self, report: &Report) -> Result<String> {
        let document = ReportElement {
            run_id: report.run_id.to_string(),
            processes: report
                .processes
                .iter()
                .map(|process| ProcessElement {
                    name: process.process.to_string(),
                    objects: process
                        .objects
                        .iter()
                        .map(|metric| ObjectElement {
                            name: metric.name.clone(),
                            metrics: entries(metric)
                                .into_iter()
                                .map(|(name, value)| MetricElement { name, value })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        };

        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let mut serializer = quick_xml::se::Serializer::new(&mut out);
        serializer.indent(' ', 2);
        document
            .serialize(serializer)
            .map_err(|e| EtlError::Report(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::report::fixtures::sample_report;

    #[test]
    fn test_xml_nesting_and_escaping() {
        let rendered = XmlRenderer.render(&sample_report()).unwrap();

        assert!(rendered.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<report run_id="));
        assert!(rendered.contains("<process name=\"Extraction\">"));
        assert!(rendered.contains("<object name=\"GTI\">"));
        assert!(rendered.contains("<metric name=\"number_of_files_downloaded\">13</metric>"));
        // The apostrophe in the failure message must be escaped or left as text, never break the markup
        assert!(rendered.contains("<metric name=\"status\">failed: Missing column"));
        assert!(rendered.trim_end().ends_with("</report>"));
    }

    #[test]
    fn test_xml_empty_report() {
        let rendered = XmlRenderer.render(&Report::new()).unwrap();
        assert!(rendered.contains("<report run_id="));
    }
}
