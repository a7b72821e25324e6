//! Run metrics
//!
//! Every stage unit owns one [`Metric`]: an insertion-ordered bag of typed
//! values plus the unit's final [`UnitStatus`]. The pipeline groups unit metrics
//! into one [`ProcessMetric`] per [`Phase`] and returns them as a [`Report`].
//!
//! The keys a unit records are listed in [`keys`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recognized metric keys
pub mod keys {
    // ========================================================================
    // All units
    // ========================================================================
    pub const DATA_DIRECTORY: &str = "data_directory";
    pub const SAVE_DIRECTORY: &str = "save_directory";

    // ========================================================================
    // Extractors
    // ========================================================================
    pub const NUMBER_OF_LINKS: &str = "number_of_links";
    pub const NUMBER_OF_FILES_DOWNLOADED: &str = "number_of_files_downloaded";
    pub const FAILED_LINKS: &str = "failed_links";
    pub const FAILED_WRITES: &str = "failed_writes";

    // ========================================================================
    // Transformers
    // ========================================================================
    pub const WORKERS: &str = "workers";
    pub const FAILED_ENTRIES: &str = "failed_entries";
    pub const MERGED_FILE: &str = "merged_file";

    // ========================================================================
    // Transformers and loaders
    // ========================================================================
    pub const NUMBER_OF_FILES_READ: &str = "number_of_files_read";
    pub const NUMBER_OF_FILES_WRITTEN: &str = "number_of_files_written";

    // ========================================================================
    // Loaders
    // ========================================================================
    pub const OPERATIONS: &str = "operations";
}

/// A single metric value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl MetricValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetricValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetricValue::List(values) => Some(values),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Int(value) => write!(f, "{}", value),
            MetricValue::Text(value) => f.write_str(value),
            MetricValue::List(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Int(value)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

impl From<&std::path::Path> for MetricValue {
    fn from(value: &std::path::Path) -> Self {
        MetricValue::Text(value.display().to_string())
    }
}

impl From<Vec<String>> for MetricValue {
    fn from(values: Vec<String>) -> Self {
        MetricValue::List(values)
    }
}

/// Outcome of one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Pending,
    Succeeded,
    Failed {
        error: String,
    },
    Cancelled,
}

impl UnitStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, UnitStatus::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Succeeded => "succeeded",
            UnitStatus::Failed { .. } => "failed",
            UnitStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitStatus::Failed { error } => write!(f, "failed: {}", error),
            other => f.write_str(other.label()),
        }
    }
}

/// Measurements recorded by one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(with = "ordered_values")]
    values: Vec<(String, MetricValue)>,
    #[serde(default)]
    pub status: UnitStatus,
}

impl Metric {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            status: UnitStatus::Pending,
        }
    }

    /// Set `key`, replacing an earlier value in place
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.values.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.values.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.values
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(MetricValue::as_int)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Serialize the ordered pairs as a JSON object, keeping insertion order
mod ordered_values {
    use super::MetricValue;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(values: &[(String, MetricValue)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(values.len()))?;
        for (key, value) in values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, MetricValue)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, MetricValue)>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of metric values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, MetricValue>()? {
                    values.push((key, value));
                }
                Ok(values)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

/// The three pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Extraction,
    Transformation,
    Loading,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Extraction, Phase::Transformation, Phase::Loading];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Extraction => "Extraction",
            Phase::Transformation => "Transformation",
            Phase::Loading => "Loading",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit metrics of one phase, in configured order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMetric {
    pub process: Phase,
    pub objects: Vec<Metric>,
}

impl ProcessMetric {
    pub fn new(process: Phase) -> Self {
        Self {
            process,
            objects: Vec::new(),
        }
    }
}

/// Everything one pipeline run measured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub processes: Vec<ProcessMetric>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            processes: Vec::new(),
        }
    }

    pub fn process(&self, phase: Phase) -> Option<&ProcessMetric> {
        self.processes.iter().find(|process| process.process == phase)
    }

    /// `(phase, unit metric)` for every unit that failed
    pub fn failed_units(&self) -> Vec<(Phase, &Metric)> {
        self.processes
            .iter()
            .flat_map(|process| {
                process
                    .objects
                    .iter()
                    .filter(|metric| metric.status.is_failed())
                    .map(move |metric| (process.process, metric))
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_units().is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.iter().all(|process| process.objects.is_empty())
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_last_write_wins_in_place() {
        let mut metric = Metric::new("GTI");
        metric
            .add(keys::NUMBER_OF_FILES_READ, 3usize)
            .add(keys::SAVE_DIRECTORY, "data/gti")
            .add(keys::NUMBER_OF_FILES_READ, 5usize);

        let names: Vec<_> = metric.values().map(|(key, _)| key).collect();
        assert_eq!(names, vec![keys::NUMBER_OF_FILES_READ, keys::SAVE_DIRECTORY]);
        assert_eq!(metric.get_int(keys::NUMBER_OF_FILES_READ), Some(5));
        assert_eq!(metric.len(), 2);
    }

    #[test]
    fn test_metric_value_display() {
        assert_eq!(MetricValue::Int(4).to_string(), "4");
        assert_eq!(
            MetricValue::List(vec!["merge".into(), "sorting".into()]).to_string(),
            "[merge, sorting]"
        );
    }

    #[test]
    fn test_metric_json_keeps_order() {
        let mut metric = Metric::new("loader");
        metric
            .add(keys::OPERATIONS, vec!["merge".to_string(), "sorting".to_string()])
            .add(keys::NUMBER_OF_FILES_WRITTEN, 1usize);
        metric.status = UnitStatus::Succeeded;

        let json = serde_json::to_string(&metric).unwrap();
        assert_eq!(
            json,
            r#"{"name":"loader","values":{"operations":["merge","sorting"],"number_of_files_written":1},"status":{"state":"succeeded"}}"#
        );

        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metric);
    }

    #[test]
    fn test_failed_units() {
        let mut ok = Metric::new("ok");
        ok.status = UnitStatus::Succeeded;
        let mut broken = Metric::new("broken");
        broken.status = UnitStatus::Failed {
            error: "boom".into(),
        };

        let mut report = Report::new();
        report.processes.push(ProcessMetric {
            process: Phase::Loading,
            objects: vec![ok, broken],
        });

        let failed = report.failed_units();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, Phase::Loading);
        assert_eq!(failed[0].1.name, "broken");
        assert!(report.has_failures());
        assert!(!report.is_empty());
    }

    #[test]
    fn test_empty_report() {
        let report = Report::new();
        assert!(report.is_empty());
        assert!(!report.has_failures());
        assert!(report.process(Phase::Extraction).is_none());
    }
}
