//! HTTP trigger surface: per-stage and full-pipeline triggers,
//! plus run-status polling. Every response is a `{status, message, data}`
//! envelope regardless of success or failure.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hockey_sync_scraper::fetcher::Fetcher;
use hockey_sync_scraper::pipeline::orchestrator::{Mode, Orchestrator, RunRecord};
use hockey_sync_scraper::pipeline::stages::{competitions, games, ladder, players, results, teams};
use hockey_sync_scraper::pipeline::{RunOptions, StageContext, StageOutcome};
use hockey_sync_scraper::store::{Store, StoreCounts};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use url::Url;

use crate::transport::ReqwestTransport;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub fetcher: Fetcher<ReqwestTransport>,
    pub base_url: Url,
    pub focus_keyword: String,
    pub concurrency: usize,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    fn stage_context(&self) -> StageContext<ReqwestTransport> {
        let mut ctx = StageContext::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.base_url.clone(),
            self.focus_keyword.clone(),
        );
        ctx.concurrency = self.concurrency;
        ctx
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                status: "ok",
                message: message.into(),
                data: Some(data),
            }),
        )
    }

    fn error(code: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            code,
            Json(Self {
                status: "error",
                message: message.into(),
                data: None,
            }),
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/pipeline/:stage", post(trigger_stage))
        .route("/run-pipeline", post(trigger_run))
        .route("/run-pipeline/:id", get(run_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<StoreCounts>>) {
    ApiResponse::ok("store counts", state.store.counts().await)
}

async fn trigger_stage(
    State(state): State<AppState>,
    Path(stage): Path<String>,
    Query(opts): Query<RunOptions>,
) -> (StatusCode, Json<ApiResponse<StageOutcome>>) {
    let ctx = state.stage_context();

    let outcome = match stage.as_str() {
        "competitions" => competitions::run(&ctx, &opts).await,
        "teams" => teams::run(&ctx, &opts).await,
        "games" => games::run(&ctx, &opts).await,
        "results" => results::run(&ctx, &opts).await,
        "players" => players::run(&ctx, &opts).await,
        "ladder" => ladder::run(&ctx, &opts).await,
        other => {
            return ApiResponse::error(StatusCode::NOT_FOUND, format!("unknown stage {other}"));
        }
    };

    match outcome {
        Ok(outcome) if outcome.success => ApiResponse::ok(format!("{stage} stage completed"), outcome),
        Ok(outcome) => {
            let message = outcome.error.clone().unwrap_or_else(|| "stage failed".to_string());
            (StatusCode::UNPROCESSABLE_ENTITY, Json(ApiResponse { status: "error", message, data: Some(outcome) }))
        }
        Err(e) => {
            warn!("stage {stage} errored: {e}");
            ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunPipelineQuery {
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(flatten)]
    opts: RunOptions,
}

fn default_mode() -> String {
    "full".to_string()
}

#[derive(Debug, Serialize)]
struct RunStarted {
    run_id: String,
}

async fn trigger_run(
    State(state): State<AppState>,
    Query(query): Query<RunPipelineQuery>,
) -> (StatusCode, Json<ApiResponse<RunStarted>>) {
    let Some(mode) = Mode::parse(&query.mode) else {
        return ApiResponse::error(StatusCode::BAD_REQUEST, format!("unknown mode {}", query.mode));
    };

    let ctx = state.stage_context();
    let run_id = state.orchestrator.start_run(ctx, mode, query.opts).await;

    ApiResponse::ok("run started", RunStarted { run_id })
}

async fn run_status(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<ApiResponse<RunRecord>>) {
    match state.orchestrator.get_run(&id).await {
        Some(record) => ApiResponse::ok("run status", record),
        None => ApiResponse::error(StatusCode::NOT_FOUND, format!("no run with id {id}")),
    }
}
