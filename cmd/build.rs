use tonic_build::manual::{Builder, Method, Service};

fn main() {
    let method = |name: &str, route: &str, message: &str| {
        Method::builder()
            .name(name)
            .route_name(route)
            .input_type(format!("crate::grpc::proto::{message}Request"))
            .output_type(format!("crate::grpc::proto::{message}Response"))
            .codec_path("tonic::codec::ProstCodec")
            .build()
    };

    let service = Service::builder()
        .name("MetricsService")
        .package("promscrape.v1")
        .method(method("get_metrics", "GetMetrics", "GetMetrics"))
        .method(method("query_metrics", "QueryMetrics", "QueryMetrics"))
        .method(method("list_metrics", "ListMetrics", "ListMetrics"))
        .build();

    Builder::new().compile(&[service]);
}
