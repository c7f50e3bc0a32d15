use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use metricscrape::{MetricRegistry, ScrapeScheduler, TargetFetcher};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Scrapes metrics endpoints on a schedule and re-serves the latest values")]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Port to expose metrics on
    #[arg(long, default_value_t = 9090)]
    port: u16,

    /// Port for the gRPC API [default: --port + 1]
    #[arg(long)]
    grpc_port: Option<u16>,

    /// Maximum number of scrapes in flight across all jobs (unbounded if unset)
    #[arg(long)]
    max_concurrent_scrapes: Option<usize>,
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

    let grpc_port = match cli.grpc_port {
        Some(port) => port,
        None => cli
            .port
            .checked_add(1)
            .ok_or_else(|| eyre!("no port after {} for the grpc server", cli.port))?,
    };

    let http_addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], grpc_port));

    let config = promscrape::load_config(&cli.config)?;
    let jobs = config.jobs()?;
    tracing::info!(config = %cli.config.display(), jobs = jobs.len(), "loaded config");

    let registry = Arc::new(MetricRegistry::new());
    let fetcher = Arc::new(TargetFetcher::new(Arc::clone(&registry)));
    let mut scheduler = ScrapeScheduler::new(fetcher, jobs);
    if let Some(max_in_flight) = cli.max_concurrent_scrapes {
        scheduler = scheduler.with_concurrency_limit(max_in_flight);
    }

    let token = CancellationToken::new();
    let mut loops = scheduler.start(token.clone());
    tokio::spawn(shutdown_signal(token.clone()));

    // The first server to fail drops the other.
    let served = tokio::try_join!(
        promscrape::http::server(http_addr, Arc::clone(&registry), token.clone()),
        promscrape::grpc::server(grpc_addr, registry, token.clone()),
    )
    .map(|_| ());

    // A server may also stop on its own error; stop scraping either way.
    token.cancel();
    while loops.join_next().await.is_some() {}
    served
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(?error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(?error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = token.cancelled() => return,
    }
    tracing::info!("shutting down gracefully");
    token.cancel();
}
