//! Stage workers and the orchestrator that sequences them. Data flows between stages only through the [`crate::store::Store`];
//! stages never hand each other in-memory state.

pub mod orchestrator;
pub mod stages;
pub mod staleness;

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::fetcher::{Fetcher, HttpClient};
use crate::store::Store;

/// Default width of the bounded worker pool used for independent fetch/parse
/// work within a single stage.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// The outcome of a single stage run.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: &'static str,
    pub success: bool,
    pub error: Option<String>,
    pub ok_count: u64,
    pub error_count: u64,
    pub duration_s: f64,
}

impl StageOutcome {
    fn ok(stage: &'static str, ok_count: u64, error_count: u64, duration_s: f64) -> Self {
        Self {
            stage,
            success: true,
            error: None,
            ok_count,
            error_count,
            duration_s,
        }
    }

    fn failed(stage: &'static str, error: impl Into<String>, duration_s: f64) -> Self {
        Self {
            stage,
            success: false,
            error: Some(error.into()),
            ok_count: 0,
            error_count: 0,
            duration_s,
        }
    }
}

/// Selectors and flags shared by every stage's public surface. Deserializable so axum can
/// build one straight from a request's query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub team_id: Option<String>,
    pub comp_id: Option<String>,
    pub grade_id: Option<String>,
    /// Results stage look-back window, in days.
    pub days: Option<i64>,
    pub limit_teams: Option<usize>,
    pub limit_games: Option<usize>,
    pub mentone_only: bool,
    pub force_update: bool,
    pub dry_run: bool,
    /// Max rounds scanned per grade by the Games stage before giving up even
    /// absent the three-empty-rounds termination rule.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_max_rounds() -> u32 {
    23
}

impl RunOptions {
    pub fn new() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            ..Default::default()
        }
    }
}

/// The ambient handles every stage needs: the store, a fetcher bound to a
/// concrete transport, the site's base URL, and the configured focus-club
/// keyword. Cheap to `Clone` (every field is itself a cheap handle).
#[derive(Clone)]
pub struct StageContext<C> {
    pub store: Store,
    pub fetcher: Fetcher<C>,
    pub base_url: Url,
    pub focus_keyword: String,
    pub concurrency: usize,
}

impl<C: HttpClient> StageContext<C> {
    pub fn new(store: Store, fetcher: Fetcher<C>, base_url: Url, focus_keyword: impl Into<String>) -> Self {
        Self {
            store,
            fetcher,
            base_url,
            focus_keyword: focus_keyword.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Runs `f` over every item in `items` on a worker pool bounded to `width`
/// concurrent tasks, using a `JoinSet` plus a semaphore so the upstream
/// site only ever sees `width` requests in flight at once.
pub(crate) async fn for_each_bounded<T, F, Fut>(items: Vec<T>, width: usize, f: F)
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let mut set = JoinSet::new();

    for item in items {
        let sem = semaphore.clone();
        let f = f.clone();
        set.spawn(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore is never closed");
            f(item).await;
        });
    }

    while set.join_next().await.is_some() {}
}
