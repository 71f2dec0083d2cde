//! HTTP fetcher.
//!
//! The library never depends directly on `reqwest`; [`HttpClient`] only
//! abstracts "GET a URL, get back a status code and a body". Concrete
//! transports (the `reqwest`-backed client used by the binary crate)
//! implement [`HttpClient`] and [`TransportError`]. The retry/backoff/
//! polite-delay contract lives entirely in this module so it is identical
//! regardless of transport.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::FetchError;

/// User-agent string sent with every request, including a version tag.
pub const USER_AGENT: &str = concat!("hockey-sync/", env!("CARGO_PKG_VERSION"));

/// Lets a transport's error type tell the fetcher whether a failure was a
/// timeout (retryable on the same schedule as 5xx) versus a generic network
/// error (also retryable). This trait is local to this crate, so the orphan
/// rule allows implementing it for foreign error types such as
/// `reqwest::Error`.
pub trait TransportError: std::fmt::Display + Send + Sync + 'static {
    fn is_timeout(&self) -> bool;
}

/// Abstracts the HTTP transport. `get` takes `&self` (not `&mut self`) so a
/// single client can be shared across the bounded worker pool within a
/// stage.
pub trait HttpClient: Send + Sync {
    type Error: TransportError;
    type Future: Future<Output = Result<(u16, String), Self::Error>> + Send;

    fn get(&self, url: Url) -> Self::Future;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub polite_delay: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(12),
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
            polite_delay: Duration::from_millis(500),
        }
    }
}

/// Issues GET requests with retry/backoff and a shared polite delay between
/// successive requests on the same pool. Cheaply `Clone`-able
/// so it can be handed to every worker in a stage's bounded pool; the polite
/// delay is enforced via a shared `last_request` timestamp.
pub struct Fetcher<C> {
    client: C,
    config: FetcherConfig,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl<C: Clone> Clone for Fetcher<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            last_request: self.last_request.clone(),
        }
    }
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C, config: FetcherConfig) -> Self {
        Self {
            client,
            config,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    async fn wait_for_polite_delay(&self) {
        if self.config.polite_delay.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.config.polite_delay {
                tokio::time::sleep(self.config.polite_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Fetch `url`, retrying transient failures up to `max_retries` times
    /// with linear-increasing backoff `base * (attempt + 1)`. 4xx other than
    /// 404 and 404 itself are never retried.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: Url) -> Result<String, FetchError> {
        let mut attempt = 0u32;

        loop {
            self.wait_for_polite_delay().await;

            let result = tokio::time::timeout(self.config.timeout, self.client.get(url.clone())).await;

            let outcome = match result {
                Err(_elapsed) => Err(FetchError::Timeout { url: url.to_string() }),
                Ok(Err(transport_err)) => {
                    if transport_err.is_timeout() {
                        Err(FetchError::Timeout { url: url.to_string() })
                    } else {
                        Err(FetchError::Network {
                            url: url.to_string(),
                            message: transport_err.to_string(),
                        })
                    }
                }
                Ok(Ok((status, body))) => {
                    if (200..300).contains(&status) {
                        return Ok(body);
                    } else if status == 404 {
                        return Err(FetchError::Http4xx {
                            url: url.to_string(),
                            status,
                        });
                    } else if (400..500).contains(&status) {
                        return Err(FetchError::Http4xx {
                            url: url.to_string(),
                            status,
                        });
                    } else {
                        Err(FetchError::Http5xx {
                            url: url.to_string(),
                            status,
                        })
                    }
                }
            };

            let err = match outcome {
                Ok(never) => return Ok(never),
                Err(e) => e,
            };

            let retryable = matches!(err, FetchError::Timeout { .. } | FetchError::Network { .. } | FetchError::Http5xx { .. });
            if !retryable || attempt >= self.config.max_retries {
                if attempt > 0 {
                    warn!(attempt, "giving up on {url} after retries: {err}");
                }
                return Err(err);
            }

            let delay = self.config.backoff_base * (attempt + 1);
            debug!(attempt, ?delay, "retrying {url} after error: {err}");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
