//! One-shot CLI: runs every stage once against a fresh or existing store and
//! exits, for cron-style invocation outside the long-running HTTP server.

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use hockey_sync::config::Config;
use hockey_sync::transport::ReqwestTransport;
use hockey_sync_scraper::fetcher::{Fetcher, FetcherConfig};
use hockey_sync_scraper::pipeline::orchestrator::{Mode, Orchestrator, RunStatus};
use hockey_sync_scraper::pipeline::{RunOptions, StageContext};
use hockey_sync_scraper::store::Store;

#[derive(Debug, Parser)]
struct Cli {
    /// Stage bundle to run: setup, fixtures, daily, weekly, or full.
    #[arg(long, default_value = "full")]
    mode: String,

    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    force_update: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mode = Mode::parse(&cli.mode).with_context(|| format!("unknown mode {}", cli.mode))?;

    let config = Config::from_env().context("loading configuration")?;
    let store = Store::open_file(config.store_path.clone()).await;
    let transport = ReqwestTransport::new().context("building http transport")?;
    let fetcher = Fetcher::new(transport, FetcherConfig::default());

    let mut ctx = StageContext::new(store.clone(), fetcher, config.base_url.clone(), config.focus_keyword.clone());
    ctx.concurrency = config.concurrency;

    let mut opts = RunOptions::new();
    opts.dry_run = cli.dry_run;
    opts.force_update = cli.force_update;

    let orchestrator = Arc::new(Orchestrator::new());
    let run_id = orchestrator.start_run(ctx, mode, opts).await;

    let record = loop {
        let record = orchestrator.get_run(&run_id).await.expect("just-started run must exist");
        if record.status != RunStatus::Running {
            break record;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    };

    serde_json::to_writer_pretty(std::io::stdout(), &record)?;
    println!();

    if !cli.dry_run {
        store.save().await.context("saving store")?;
    }

    if record.status == RunStatus::Failed {
        anyhow::bail!("run {run_id} failed: {}", record.error.unwrap_or_default());
    }

    Ok(())
}
