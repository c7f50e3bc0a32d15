//! `promscrape.v1.MetricsService`: the query surface of the HTTP API over gRPC.

use std::{net::SocketAddr, sync::Arc};

use color_eyre::eyre::{Result, WrapErr};
use metricscrape::{codec, Metric, MetricRegistry};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

use self::proto::metrics_service_server::{MetricsService, MetricsServiceServer};
use super::api::sorted;

/// Protobuf messages and the service stubs generated from them.
pub mod proto {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Metric {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub r#type: String,
        #[prost(double, tag = "3")]
        pub value: f64,
        #[prost(map = "string, string", tag = "4")]
        pub labels: HashMap<String, String>,
        /// Seconds since the epoch.
        #[prost(int64, tag = "5")]
        pub timestamp: i64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GetMetricsRequest {}

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GetMetricsResponse {
        #[prost(string, tag = "1")]
        pub content: String,
        #[prost(string, tag = "2")]
        pub content_type: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct QueryMetricsRequest {
        #[prost(string, tag = "1")]
        pub query: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct QueryMetricsResponse {
        #[prost(string, tag = "1")]
        pub status: String,
        #[prost(message, repeated, tag = "2")]
        pub data: Vec<Metric>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ListMetricsRequest {
        #[prost(string, tag = "1")]
        pub filter: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ListMetricsResponse {
        #[prost(message, repeated, tag = "1")]
        pub metrics: Vec<Metric>,
    }

    include!(concat!(env!("OUT_DIR"), "/promscrape.v1.MetricsService.rs"));
}

impl From<&Metric> for proto::Metric {
    fn from(metric: &Metric) -> Self {
        Self {
            name: metric.name.clone(),
            r#type: metric.metric_type.to_string(),
            value: metric.value,
            labels: metric
                .labels
                .iter()
                .map(|l| (l.name.clone(), l.value.clone()))
                .collect(),
            timestamp: metric.timestamp.map_or(0, |t| t.unix_timestamp()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsServer {
    registry: Arc<MetricRegistry>,
}

impl MetricsServer {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }

    pub fn into_service(self) -> MetricsServiceServer<Self> {
        MetricsServiceServer::new(self)
    }

    fn matching(&self, name: &str) -> Vec<proto::Metric> {
        sorted(self.registry.query(name))
            .iter()
            .map(proto::Metric::from)
            .collect()
    }
}

#[tonic::async_trait]
impl MetricsService for MetricsServer {
    async fn get_metrics(
        &self,
        _request: Request<proto::GetMetricsRequest>,
    ) -> Result<Response<proto::GetMetricsResponse>, Status> {
        Ok(Response::new(proto::GetMetricsResponse {
            content: codec::encode(&self.registry.get_all()),
            content_type: codec::CONTENT_TYPE.to_owned(),
        }))
    }

    async fn query_metrics(
        &self,
        request: Request<proto::QueryMetricsRequest>,
    ) -> Result<Response<proto::QueryMetricsResponse>, Status> {
        let req = request.into_inner();
        let data = self.matching(&req.query);
        tracing::debug!(query = %req.query, results = data.len(), "grpc query");
        Ok(Response::new(proto::QueryMetricsResponse {
            status: "success".to_owned(),
            data,
        }))
    }

    async fn list_metrics(
        &self,
        request: Request<proto::ListMetricsRequest>,
    ) -> Result<Response<proto::ListMetricsResponse>, Status> {
        let req = request.into_inner();
        Ok(Response::new(proto::ListMetricsResponse {
            metrics: self.matching(&req.filter),
        }))
    }
}

/// Serves [`MetricsServer`] on `addr` until `token` is cancelled.
pub async fn server(
    addr: SocketAddr,
    registry: Arc<MetricRegistry>,
    token: CancellationToken,
) -> Result<()> {
    tracing::info!("start grpc server: {:?}", addr);
    tonic::transport::Server::builder()
        .add_service(MetricsServer::new(registry).into_service())
        .serve_with_shutdown(addr, async move { token.cancelled().await })
        .await
        .wrap_err_with(|| format!("grpc server on {addr} failed"))
}
