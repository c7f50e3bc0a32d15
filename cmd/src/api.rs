// Copyright 2022 Zinc Labs Inc. and Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderName},
    response::{Html, Json},
};
use metricscrape::{codec, Metric, MetricRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct QueryRequest {
    /// Exact metric name; empty or missing selects every metric.
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListRequest {
    #[serde(default)]
    pub filter: String,
}

/// Current metrics in text exposition format.
pub async fn metrics(
    State(registry): State<Arc<MetricRegistry>>,
) -> ([(HeaderName, &'static str); 1], String) {
    let body = codec::encode(&registry.get_all());
    ([(header::CONTENT_TYPE, codec::CONTENT_TYPE)], body)
}

pub async fn query(
    State(registry): State<Arc<MetricRegistry>>,
    req: Query<QueryRequest>,
) -> Json<Value> {
    let data = sorted(registry.query(&req.query));
    tracing::debug!(query = %req.query, results = data.len(), "query");
    Json(json!({
        "status": "success",
        "data": data,
    }))
}

pub async fn list_metrics(
    State(registry): State<Arc<MetricRegistry>>,
    req: Query<ListRequest>,
) -> Json<Value> {
    let data = sorted(registry.query(&req.filter));
    Json(json!({ "metrics": data }))
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub(crate) fn sorted(mut metrics: Vec<Metric>) -> Vec<Metric> {
    metrics.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
    metrics
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>promscrape</title>
</head>
<body>
    <h1>promscrape</h1>
    <ul>
        <li><a href="/metrics">GET /metrics</a> - scraped metrics, text exposition format</li>
        <li><a href="/api/v1/query">GET /api/v1/query?query=&lt;name&gt;</a> - query by name (JSON)</li>
        <li><a href="/api/v1/metrics">GET /api/v1/metrics?filter=&lt;name&gt;</a> - list metrics (JSON)</li>
    </ul>
    <p>The same queries are served over gRPC as <code>promscrape.v1.MetricsService</code>
    (GetMetrics, QueryMetrics, ListMetrics) on the gRPC port.</p>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use expect_test::expect;
    use metricscrape::{Labels, MetricType};

    use super::*;

    fn registry() -> Arc<MetricRegistry> {
        let registry = Arc::new(MetricRegistry::new());
        registry.register(
            Metric::new("http_requests_total", MetricType::Counter, 10.0)
                .with_labels(Labels::new([("method", "POST"), ("job", "api")])),
        );
        registry.register(
            Metric::new("http_requests_total", MetricType::Counter, 20.0)
                .with_labels(Labels::new([("method", "GET"), ("job", "api")])),
        );
        registry.register(Metric::new("cpu_usage_percent", MetricType::Gauge, 12.5));
        registry
    }

    /// Drops timestamps, which change from run to run.
    fn without_timestamps(mut value: Value) -> Value {
        fn strip(metrics: &mut Value) {
            if let Some(metrics) = metrics.as_array_mut() {
                for metric in metrics {
                    if let Some(metric) = metric.as_object_mut() {
                        assert!(metric.remove("timestamp").is_some());
                    }
                }
            }
        }
        if let Some(object) = value.as_object_mut() {
            object.values_mut().for_each(strip);
        }
        value
    }

    #[tokio::test]
    async fn test_metrics() {
        let ([(name, content_type)], body) = metrics(State(registry())).await;
        assert_eq!(name, header::CONTENT_TYPE);
        assert_eq!(content_type, "text/plain; version=0.0.4");
        expect![[r#"
            # TYPE cpu_usage_percent gauge
            cpu_usage_percent 12.5
            # TYPE http_requests_total counter
            http_requests_total{job="api",method="GET"} 20
            http_requests_total{job="api",method="POST"} 10
        "#]]
        .assert_eq(&body);
    }

    #[tokio::test]
    async fn test_query() {
        let req = Query(QueryRequest {
            query: "http_requests_total".to_owned(),
        });
        let Json(value) = query(State(registry()), req).await;
        expect![[r#"
            {
              "data": [
                {
                  "labels": {
                    "job": "api",
                    "method": "GET"
                  },
                  "name": "http_requests_total",
                  "type": "counter",
                  "value": 20.0
                },
                {
                  "labels": {
                    "job": "api",
                    "method": "POST"
                  },
                  "name": "http_requests_total",
                  "type": "counter",
                  "value": 10.0
                }
              ],
              "status": "success"
            }"#]]
        .assert_eq(&serde_json::to_string_pretty(&without_timestamps(value)).unwrap());

        let Json(value) = query(State(registry()), Query(QueryRequest::default())).await;
        assert_eq!(value["data"].as_array().unwrap().len(), 3);

        let req = Query(QueryRequest {
            query: "missing".to_owned(),
        });
        let Json(value) = query(State(registry()), req).await;
        assert_eq!(value, json!({"status": "success", "data": []}));
    }

    #[tokio::test]
    async fn test_list_metrics() {
        let req = Query(ListRequest {
            filter: "cpu_usage_percent".to_owned(),
        });
        let Json(value) = list_metrics(State(registry()), req).await;
        expect![[r#"
            {
              "metrics": [
                {
                  "name": "cpu_usage_percent",
                  "type": "gauge",
                  "value": 12.5
                }
              ]
            }"#]]
        .assert_eq(&serde_json::to_string_pretty(&without_timestamps(value)).unwrap());

        let Json(value) = list_metrics(State(registry()), Query(ListRequest::default())).await;
        assert_eq!(value["metrics"].as_array().unwrap().len(), 3);
    }
}
