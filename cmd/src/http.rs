use axum::routing::get;
use axum::Router;
use color_eyre::eyre::{Result, WrapErr};
use metricscrape::MetricRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

use super::api;

pub fn router(registry: Arc<MetricRegistry>) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/metrics", get(api::metrics))
        .route("/api/v1/query", get(api::query).post(api::query))
        .route("/api/v1/metrics", get(api::list_metrics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(registry)
}

/// Serves the registry on `addr` until `token` is cancelled.
pub async fn server(
    addr: SocketAddr,
    registry: Arc<MetricRegistry>,
    token: CancellationToken,
) -> Result<()> {
    let app = router(registry);

    tracing::info!("start http server: {:?}", addr);
    axum::Server::try_bind(&addr)
        .wrap_err_with(|| format!("failed to bind {addr}"))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .wrap_err("http server failed")
}
