//! Demo service exposing a handful of counters and gauges on `/metrics`, for
//! promscrape to scrape.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::Html,
    routing::get,
    Router,
};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use metricscrape::{codec, Labels, Metric, MetricType};
use rand::Rng;
use tracing_subscriber::EnvFilter;

const UPDATE_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(about = "Serves simulated metrics for promscrape to scrape")]
struct Cli {
    /// Port to expose metrics on
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn advance(&self, rng: &mut impl Rng) {
        self.requests
            .fetch_add(rng.gen_range(1..=10), Ordering::Relaxed);
        if rng.gen_bool(0.2) {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current counters plus freshly sampled gauges.
    fn snapshot(&self, rng: &mut impl Rng) -> Vec<Metric> {
        let requests = self.requests.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let cpu = rng.gen_range(0.0..100.0_f64);
        vec![
            Metric::new("http_requests_total", MetricType::Counter, requests as f64)
                .with_labels(Labels::new([("method", "GET"), ("endpoint", "/api")])),
            Metric::new("http_requests_total", MetricType::Counter, (requests / 2) as f64)
                .with_labels(Labels::new([("method", "POST"), ("endpoint", "/api")])),
            Metric::new("http_errors_total", MetricType::Counter, errors as f64),
            Metric::new(
                "memory_usage_bytes",
                MetricType::Gauge,
                rng.gen_range(500_000_000_u64..1_500_000_000) as f64,
            ),
            Metric::new("cpu_usage_percent", MetricType::Gauge, (cpu * 100.0).round() / 100.0),
            Metric::new(
                "active_connections",
                MetricType::Gauge,
                rng.gen_range(10_u64..110) as f64,
            ),
        ]
    }
}

async fn metrics(
    State(counters): State<Arc<Counters>>,
) -> ([(HeaderName, &'static str); 1], String) {
    let body = codec::encode(&counters.snapshot(&mut rand::thread_rng()));
    ([(header::CONTENT_TYPE, codec::CONTENT_TYPE)], body)
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Example Target</title>
</head>
<body>
    <h1>Example Target</h1>
    <p><a href="/metrics">View Metrics</a></p>
</body>
</html>
"#,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let counters = Arc::new(Counters::default());
    tokio::spawn({
        let counters = Arc::clone(&counters);
        async move {
            let mut ticker = tokio::time::interval(UPDATE_INTERVAL);
            loop {
                ticker.tick().await;
                counters.advance(&mut rand::thread_rng());
            }
        }
    });

    let app = Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics))
        .with_state(counters);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("example target serving http://{addr}/metrics");
    axum::Server::try_bind(&addr)
        .wrap_err_with(|| format!("failed to bind {addr}"))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .wrap_err("http server failed")
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn test_advance() {
        let counters = Counters::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            counters.advance(&mut rng);
        }
        let requests = counters.requests.load(Ordering::Relaxed);
        assert!((20..=200).contains(&requests), "{requests}");
        assert!(counters.errors.load(Ordering::Relaxed) <= 20);
    }

    #[tokio::test]
    async fn test_metrics_scrapeable() {
        let counters = Arc::new(Counters::default());
        counters.requests.store(9, Ordering::Relaxed);

        let ([(_, content_type)], body) = metrics(State(counters)).await;
        assert_eq!(content_type, codec::CONTENT_TYPE);

        let decoded = codec::decode_str(&body).unwrap();
        assert_eq!(decoded.len(), 6);
        let value = |name: &str, method: Option<&str>| {
            decoded
                .iter()
                .find(|m| m.name == name && m.labels.get("method") == method)
                .map(|m| (m.value, m.metric_type))
        };
        assert_eq!(
            value("http_requests_total", Some("GET")),
            Some((9.0, MetricType::Counter))
        );
        assert_eq!(
            value("http_requests_total", Some("POST")),
            Some((4.0, MetricType::Counter))
        );
        assert_eq!(value("http_errors_total", None), Some((0.0, MetricType::Counter)));
        let (cpu, cpu_type) = value("cpu_usage_percent", None).unwrap();
        assert!((0.0..=100.0).contains(&cpu));
        assert_eq!(cpu_type, MetricType::Gauge);
        let (connections, _) = value("active_connections", None).unwrap();
        assert!((10.0..110.0).contains(&connections));
    }
}
