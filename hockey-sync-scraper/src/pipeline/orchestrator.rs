//! Orchestrator: sequences the stage workers, tracks
//! per-run progress, and enforces the critical-stage abort rule
//! (competitions/teams failing aborts the whole run).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::fetcher::HttpClient;
use crate::pipeline::stages::{competitions, games, ladder, players, results, teams};
use crate::pipeline::{RunOptions, StageContext, StageOutcome};

/// Default per-run deadline: a run that is still going after
/// this long is abandoned and marked failed with reason `"cancelled"`.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30 * 60);

const ALL_STAGES: [&str; 6] = ["competitions", "teams", "games", "results", "players", "ladder"];

/// Stages whose failure aborts the whole run: nothing downstream can
/// meaningfully run without competitions/grades or teams in the store.
const CRITICAL_STAGES: [&str; 2] = ["competitions", "teams"];

/// Named bundles of stages a caller can request in one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// First-run bootstrap: competitions and teams only.
    Setup,
    /// Refresh the draw without touching results/players/ladder.
    Fixtures,
    /// The frequent, cheap refresh: results, players, ladder.
    Daily,
    /// Every stage except the bootstrap ones: games, results, players, ladder.
    Weekly,
    /// Every stage, in canonical order.
    Full,
}

impl Mode {
    fn stage_names(self) -> &'static [&'static str] {
        match self {
            Mode::Setup => &["competitions", "teams"],
            Mode::Fixtures => &["games"],
            Mode::Daily => &["results", "players", "ladder"],
            Mode::Weekly => &["games", "results", "players", "ladder"],
            Mode::Full => &ALL_STAGES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Setup => "setup",
            Mode::Fixtures => "fixtures",
            Mode::Daily => "daily",
            Mode::Weekly => "weekly",
            Mode::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "setup" => Some(Mode::Setup),
            "fixtures" => Some(Mode::Fixtures),
            "daily" => Some(Mode::Daily),
            "weekly" => Some(Mode::Weekly),
            "full" => Some(Mode::Full),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// The user-visible progress record for one orchestrator run,
/// queryable by `id` for the lifetime of the process.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stage_outcomes: Vec<StageOutcome>,
    pub error: Option<String>,
}

/// Sequences stage runs and keeps an in-memory log of every run this
/// process has started, so the HTTP surface can poll a run's progress by
/// id.
pub struct Orchestrator {
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
    cancels: Arc<RwLock<HashMap<String, Arc<AtomicBool>>>>,
    next_id: AtomicU64,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            cancels: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn get_run(&self, id: &str) -> Option<RunRecord> {
        self.runs.read().await.get(id).cloned()
    }

    pub async fn list_runs(&self) -> Vec<RunRecord> {
        self.runs.read().await.values().cloned().collect()
    }

    /// Requests cancellation of a still-running run. The run observes the
    /// request between stages (not mid-stage) and finishes as `Failed` with
    /// reason `"cancelled"`.
    pub async fn cancel(&self, id: &str) -> bool {
        if let Some(flag) = self.cancels.read().await.get(id) {
            flag.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Starts a run in the background and returns its id immediately. The
    /// caller polls [`Orchestrator::get_run`] for progress.
    #[instrument(skip(self, ctx, opts))]
    pub async fn start_run<C>(self: &Arc<Self>, ctx: StageContext<C>, mode: Mode, opts: RunOptions) -> String
    where
        C: HttpClient + Clone + Send + Sync + 'static,
    {
        let id = format!("run-{}-{}", Utc::now().timestamp_millis(), self.next_id.fetch_add(1, Ordering::SeqCst));
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let record = RunRecord {
            id: id.clone(),
            mode: mode.as_str().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            stage_outcomes: vec![],
            error: None,
        };

        self.runs.write().await.insert(id.clone(), record);
        self.cancels.write().await.insert(id.clone(), cancel_flag.clone());

        let this = self.clone();
        let run_id = id.clone();
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(DEFAULT_DEADLINE, this.drive(&run_id, ctx, mode, opts, cancel_flag)).await;

            let mut runs = this.runs.write().await;
            if let Some(record) = runs.get_mut(&run_id) {
                record.finished_at = Some(Utc::now());
                match outcome {
                    Ok(()) => {}
                    Err(_elapsed) => {
                        error!(run = %run_id, "run exceeded its deadline, marking cancelled");
                        record.status = RunStatus::Failed;
                        record.error = Some("cancelled".to_string());
                    }
                }
            }
            this.cancels.write().await.remove(&run_id);
        });

        id
    }

    async fn drive<C>(self: &Arc<Self>, run_id: &str, ctx: StageContext<C>, mode: Mode, opts: RunOptions, cancel_flag: Arc<AtomicBool>)
    where
        C: HttpClient + Clone + Send + Sync + 'static,
    {
        let stage_names = mode.stage_names();
        let mut aborted = false;

        for &stage in &ALL_STAGES {
            if !stage_names.contains(&stage) {
                continue;
            }

            if cancel_flag.load(Ordering::SeqCst) {
                self.finish(run_id, RunStatus::Failed, Some("cancelled".to_string())).await;
                return;
            }

            let outcome = match run_stage(stage, &ctx, &opts).await {
                Ok(outcome) => outcome,
                Err(e) => StageOutcome {
                    stage: stage_static(stage),
                    success: false,
                    error: Some(e.to_string()),
                    ok_count: 0,
                    error_count: 0,
                    duration_s: 0.0,
                },
            };

            let failed = !outcome.success;
            {
                let mut runs = self.runs.write().await;
                if let Some(record) = runs.get_mut(run_id) {
                    record.stage_outcomes.push(outcome);
                }
            }

            if failed && CRITICAL_STAGES.contains(&stage) {
                warn!(run = %run_id, stage, "critical stage failed, aborting run");
                aborted = true;
                break;
            }
        }

        let status = if aborted { RunStatus::Failed } else { RunStatus::Completed };
        let error = if aborted {
            Some("aborted after a critical stage failed".to_string())
        } else {
            None
        };
        self.finish(run_id, status, error).await;
        info!(run = %run_id, mode = mode.as_str(), "run finished");
    }

    async fn finish(&self, run_id: &str, status: RunStatus, error: Option<String>) {
        let mut runs = self.runs.write().await;
        if let Some(record) = runs.get_mut(run_id) {
            record.status = status;
            record.error = error;
        }
    }
}

fn stage_static(name: &str) -> &'static str {
    ALL_STAGES.iter().find(|s| **s == name).copied().unwrap_or("unknown")
}

async fn run_stage<C>(stage: &str, ctx: &StageContext<C>, opts: &RunOptions) -> Result<StageOutcome, crate::error::StageError>
where
    C: HttpClient + Clone + Send + Sync + 'static,
{
    match stage {
        "competitions" => competitions::run(ctx, opts).await,
        "teams" => teams::run(ctx, opts).await,
        "games" => games::run(ctx, opts).await,
        "results" => results::run(ctx, opts).await,
        "players" => players::run(ctx, opts).await,
        "ladder" => ladder::run(ctx, opts).await,
        other => unreachable!("unknown stage name {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{Fetcher, FetcherConfig, TransportError};
    use crate::store::Store;
    use std::future::Future;
    use std::pin::Pin;
    use url::Url;

    #[derive(Debug, Clone)]
    struct FakeErr;
    impl std::fmt::Display for FakeErr {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake")
        }
    }
    impl TransportError for FakeErr {
        fn is_timeout(&self) -> bool {
            false
        }
    }

    #[derive(Clone)]
    struct FixedClient(String);
    impl HttpClient for FixedClient {
        type Error = FakeErr;
        type Future = Pin<Box<dyn Future<Output = Result<(u16, String), Self::Error>> + Send>>;
        fn get(&self, _url: Url) -> Self::Future {
            let body = self.0.clone();
            Box::pin(async move { Ok((200, body)) })
        }
    }

    fn test_ctx(body: &str) -> StageContext<FixedClient> {
        let fetcher = Fetcher::new(
            FixedClient(body.to_string()),
            FetcherConfig {
                polite_delay: std::time::Duration::ZERO,
                ..Default::default()
            },
        );
        StageContext::new(
            Store::in_memory(),
            fetcher,
            Url::parse("https://www.hockeyvictoria.org.au/").unwrap(),
            "mentone",
        )
    }

    // an empty competitions index aborts the run before the teams stage
    // ever runs.
    #[tokio::test]
    async fn empty_competitions_index_aborts_the_run() {
        let ctx = test_ctx("<html><body></body></html>");
        let orchestrator = Arc::new(Orchestrator::new());
        let id = orchestrator.start_run(ctx, Mode::Setup, RunOptions::new()).await;

        let record = wait_for_finish(&orchestrator, &id).await;
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.stage_outcomes.len(), 1);
        assert_eq!(record.stage_outcomes[0].stage, "competitions");
    }

    #[tokio::test]
    async fn setup_mode_runs_competitions_then_teams() {
        let html = r#"
  <html><body>
  <h2>Senior Competition 2025 <a href="/reports/games/22076">Draws</a></h2>
  <div><a href="/games/22076/37393">Men's Pennant B</a></div>
  <table>
  <tr><th>Team</th><th>P</th><th>W</th><th>D</th><th>L</th><th>B</th><th>GF</th><th>GA</th><th>GD</th><th>Pts</th></tr>
  <tr>
  <td><a href="/games/team/22076/337089">1. Mentone</a></td>
  <td>10</td><td>8</td><td>1</td><td>1</td><td>0</td>
  <td>32</td><td>11</td><td>21</td><td>25</td>
  </tr>
  </table>
  </body></html>
  "#;
        let ctx = test_ctx(html);
        let store = ctx.store.clone();
        let orchestrator = Arc::new(Orchestrator::new());
        let id = orchestrator.start_run(ctx, Mode::Setup, RunOptions::new()).await;

        let record = wait_for_finish(&orchestrator, &id).await;
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.stage_outcomes.iter().map(|o| o.stage).collect::<Vec<_>>(), vec!["competitions", "teams"]);
        assert_eq!(store.list_teams().await.len(), 1);
    }

    async fn wait_for_finish(orchestrator: &Arc<Orchestrator>, id: &str) -> RunRecord {
        for _ in 0..200 {
            if let Some(record) = orchestrator.get_run(id).await {
                if record.status != RunStatus::Running {
                    return record;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("run {id} never finished");
    }
}
