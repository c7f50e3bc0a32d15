use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

use crate::labels::Labels;

pub const LABEL_JOB: &str = "job";
pub const LABEL_INSTANCE: &str = "instance";

pub const TYPE_COUNTER: &str = "counter";
pub const TYPE_GAUGE: &str = "gauge";

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    #[default]
    Gauge,
}

impl MetricType {
    /// Maps the type token of a `# TYPE` directive. Anything that is not
    /// exactly `counter` or `gauge` falls back to a gauge.
    pub fn from_directive(token: &str) -> Self {
        token.parse().unwrap_or_default()
    }
}

/// The latest observation of one (name, labels) identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    /// Set by the registry on registration, RFC 3339 on the wire.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
}

impl Metric {
    pub fn new(name: impl Into<String>, metric_type: MetricType, value: f64) -> Self {
        Self {
            name: name.into(),
            metric_type,
            value,
            labels: Labels::default(),
            timestamp: None,
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn test_metric_type_from_directive() {
        assert_eq!(MetricType::from_directive(TYPE_COUNTER), MetricType::Counter);
        assert_eq!(MetricType::from_directive(TYPE_GAUGE), MetricType::Gauge);
        assert_eq!(MetricType::from_directive("Counter"), MetricType::Gauge);
        assert_eq!(MetricType::from_directive("histogram"), MetricType::Gauge);
        assert_eq!(MetricType::Counter.to_string(), TYPE_COUNTER);
    }

    #[test]
    fn test_metric_serialize() {
        let mut metric = Metric::new("http_requests_total", MetricType::Counter, 12.5)
            .with_labels(Labels::new([("method", "GET"), (LABEL_JOB, "api")]));
        expect![[r#"
            {"name":"http_requests_total","type":"counter","value":12.5,"labels":{"job":"api","method":"GET"}}
        "#]]
        .assert_eq(&format!("{}\n", serde_json::to_string(&metric).unwrap()));

        metric.labels = Labels::default();
        metric.timestamp = OffsetDateTime::from_unix_timestamp(1_681_711_100).ok();
        expect![[r#"
            {"name":"http_requests_total","type":"counter","value":12.5,"timestamp":"2023-04-17T05:58:20Z"}
        "#]]
        .assert_eq(&format!("{}\n", serde_json::to_string(&metric).unwrap()));

        let back: Metric = serde_json::from_str(&serde_json::to_string(&metric).unwrap()).unwrap();
        assert_eq!(back, metric);
    }
}
