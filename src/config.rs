//! Environment-driven configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context as _;
use url::Url;

/// Default site origin; overridable for testing against a mirror.
const DEFAULT_BASE_URL: &str = "https://www.hockeyvictoria.org.au";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub store_path: PathBuf,
    pub focus_keyword: String,
    pub concurrency: usize,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Reads configuration from the environment, loading a `.env` file
    /// first if one is present (teacher crate convention).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let base_url = match std::env::var("HOCKEY_SYNC_BASE_URL") {
            Ok(raw) => Url::parse(&raw).context("parsing HOCKEY_SYNC_BASE_URL")?,
            Err(_) => Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
        };

        let store_path = std::env::var("HOCKEY_SYNC_STORE_PATH")
            .unwrap_or_else(|_| "data/store.json".to_string())
            .into();

        let focus_keyword = std::env::var("HOCKEY_SYNC_FOCUS_KEYWORD").unwrap_or_else(|_| "mentone".to_string());

        let concurrency = std::env::var("HOCKEY_SYNC_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(hockey_sync_scraper::pipeline::DEFAULT_CONCURRENCY);

        let bind_addr = std::env::var("HOCKEY_SYNC_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("parsing HOCKEY_SYNC_BIND_ADDR")?;

        Ok(Self {
            base_url,
            store_path,
            focus_keyword,
            concurrency,
            bind_addr,
        })
    }
}
