//! Error taxonomy for the pipeline.
//!
//! These are error *kinds*, not exception types for control flow: parse and
//! per-item fetch errors are recovered locally by the callers in this crate
//! and never propagate past a single work item.

use thiserror::Error;

/// Errors the [`crate::fetcher::Fetcher`] can produce after exhausting retries.
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },
    #[error("{status} fetching {url}")]
    Http4xx { url: String, status: u16 },
    #[error("{status} fetching {url}")]
    Http5xx { url: String, status: u16 },
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url }
            | FetchError::Http4xx { url, .. }
            | FetchError::Http5xx { url, .. }
            | FetchError::Network { url, .. } => url,
        }
    }

    /// `true` for 404s, which are a normal "doesn't exist" signal (e.g. round
    /// termination) rather than an operational failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Http4xx { status: 404, .. })
    }
}

/// A structured record of a single record that an extractor chose not to
/// emit. Carries enough context to log without aborting the whole page.
#[derive(Debug, Clone)]
pub struct ParseWarning {
    pub extractor: &'static str,
    pub fragment: String,
    pub reason: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} (fragment: {})",
            self.extractor, self.reason, self.fragment
        )
    }
}

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors raised at the stage-worker level.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("critical stage {stage} produced no useful output: {reason}")]
    Critical { stage: &'static str, reason: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("run was cancelled")]
    Cancelled,
}
