//! Aggregate statistics returned by the analysis service.
//!
//! The client does not interpret the metrics; it keeps them in the order the
//! service sent them and formats them for display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
    /// The service reported the metric as null (e.g. no R-R intervals found)
    Missing,
}

impl From<serde_json::Value> for MetricValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => MetricValue::Missing,
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(MetricValue::Number)
                .unwrap_or_else(|| MetricValue::Text(n.to_string())),
            serde_json::Value::String(s) => MetricValue::Text(s),
            other => MetricValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{n:.2}"),
            MetricValue::Text(s) => write!(f, "{s}"),
            MetricValue::Missing => write!(f, "n/a"),
        }
    }
}

/// A named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
}

impl Metric {
    /// Display label: `qrs_duration` becomes `qrs duration`.
    pub fn label(&self) -> String {
        self.name.replace('_', " ")
    }
}

/// Ordered metric table for the most recently recorded dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub metrics: Vec<Metric>,
}

impl Summary {
    /// Build from the `data` object of a summary response, keeping key order.
    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            metrics: map
                .into_iter()
                .map(|(name, value)| Metric {
                    name,
                    value: value.into(),
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.iter().find(|m| m.name == name).map(|m| &m.value)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// `(label, formatted value)` pairs for a two-column table.
    pub fn rows(&self) -> Vec<(String, String)> {
        self.metrics
            .iter()
            .map(|m| (m.label(), m.value.to_string()))
            .collect()
    }
}
