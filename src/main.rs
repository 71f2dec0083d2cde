use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use hockey_sync::config::Config;
use hockey_sync::server::{self, AppState};
use hockey_sync::transport::ReqwestTransport;
use hockey_sync_scraper::fetcher::{Fetcher, FetcherConfig};
use hockey_sync_scraper::pipeline::orchestrator::Orchestrator;
use hockey_sync_scraper::store::Store;
use tokio::signal;
use tracing::{info, warn};

/// Runs the HTTP trigger surface that drives the Hockey Victoria scrape
/// pipeline.
#[derive(Debug, Parser)]
struct Cli {
    /// Address to bind the HTTP server to, overriding `HOCKEY_SYNC_BIND_ADDR`.
    #[arg(long, env = "HOCKEY_SYNC_BIND_ADDR")]
    bind_addr: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(bind_addr) = cli.bind_addr {
        config.bind_addr = bind_addr;
    }

    let store = Store::open_file(config.store_path.clone()).await;
    let transport = ReqwestTransport::new().context("building http transport")?;
    let fetcher = Fetcher::new(transport, FetcherConfig::default());
    let orchestrator = Arc::new(Orchestrator::new());

    // periodically flush the in-memory store to disk so a crash loses at
    // most a few minutes of scraped data.
    let periodic_store = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = periodic_store.save().await {
                warn!("failed to flush store to disk: {e:?}");
            }
        }
    });

    let state = AppState {
        store: store.clone(),
        fetcher,
        base_url: config.base_url.clone(),
        focus_keyword: config.focus_keyword.clone(),
        concurrency: config.concurrency,
        orchestrator,
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding to {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    if let Err(e) = store.save().await {
        warn!("failed to save store on shutdown: {e:?}");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
