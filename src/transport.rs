//! The `reqwest`-backed [`hockey_sync_scraper::fetcher::HttpClient`]
//! implementation. The scraper crate never depends on `reqwest` directly;
//! this is the one place that bridges the two.

use std::future::Future;
use std::pin::Pin;

use hockey_sync_scraper::fetcher::{HttpClient, TransportError, USER_AGENT};
use reqwest::Client;
use url::Url;

impl TransportError for reqwest::Error {
    fn is_timeout(&self) -> bool {
        reqwest::Error::is_timeout(self)
    }
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestTransport {
    type Error = reqwest::Error;
    type Future = Pin<Box<dyn Future<Output = Result<(u16, String), Self::Error>> + Send>>;

    fn get(&self, url: Url) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok((status, body))
        })
    }
}
