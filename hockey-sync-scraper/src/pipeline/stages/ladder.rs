//! Ladder refresh stage.
//!
//! Re-fetches each in-scope team's grade pointscore page and updates only
//! the `ladder` field on that [`crate::model::Team`] — never touches
//! `display_name`, `club_key`, or any other field the teams stage owns.
//! Also writes a [`crate::model::LadderCacheEntry`] per team.

use std::time::Instant;

use chrono::Utc;
use tracing::{instrument, warn};

use crate::error::StageError;
use crate::extractors::{extract_ladder, ExtractContext};
use crate::fetcher::HttpClient;
use crate::model::LadderCacheEntry;
use crate::pipeline::{for_each_bounded, RunOptions, StageContext, StageOutcome};

pub const STAGE_NAME: &str = "ladder";

#[instrument(skip(ctx, opts))]
pub async fn run<C: HttpClient + Clone + 'static>(ctx: &StageContext<C>, opts: &RunOptions) -> Result<StageOutcome, StageError> {
    let start = Instant::now();

    let mut teams = ctx.store.list_focus_club_teams().await;
    if let Some(team_id) = &opts.team_id {
        teams.retain(|t| &t.id == team_id);
    }
    if let Some(limit) = opts.limit_teams {
        teams.truncate(limit);
    }

    if teams.is_empty() {
        return Ok(StageOutcome::failed(
            STAGE_NAME,
            "no focus-club teams known; run the teams stage first",
            start.elapsed().as_secs_f64(),
        ));
    }

    let ok_count = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
    let error_count = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));

    let store = ctx.store.clone();
    let fetcher = ctx.fetcher.clone();
    let base_url = ctx.base_url.clone();
    let dry_run = opts.dry_run;
    let concurrency = ctx.concurrency;

    let ok_task = ok_count.clone();
    let error_task = error_count.clone();

    for_each_bounded(teams, concurrency, move |team| {
        let store = store.clone();
        let fetcher = fetcher.clone();
        let base_url = base_url.clone();
        let ok_count = ok_task.clone();
        let error_count = error_task.clone();

        async move {
            let Some(grade) = store.get_grade(&team.grade_id).await else {
                warn!("ladder stage: grade {} for team {} not found", team.grade_id, team.id);
                error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return;
            };

            let url = match base_url.join(&format!("/pointscore/{}/{}", grade.parent_comp_id, grade.fixture_id)) {
                Ok(u) => u,
                Err(e) => {
                    warn!("bad pointscore url for grade {}: {e}", grade.id);
                    error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    return;
                }
            };

            let html = match fetcher.fetch(url.clone()).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("failed to fetch ladder for team {}: {e}", team.id);
                    error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    return;
                }
            };

            let extract_ctx = ExtractContext::new(url);
            let (rows, warnings) = extract_ladder(&html, &extract_ctx);
            error_count.fetch_add(warnings.0.len() as u64, std::sync::atomic::Ordering::Relaxed);

            let Some(row) = rows.iter().find(|r| r.team_hv_id.as_deref() == Some(team.id.as_str())) else {
                warn!("ladder stage: team {} not found on its own grade's ladder", team.id);
                error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return;
            };

            if dry_run {
                ok_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return;
            }

            let now = Utc::now();
            let snapshot = store
                .upsert_team(&team.id, now, |t| {
                t.ladder.position = row.position;
                t.ladder.points = row.points;
                t.ladder.played = row.played;
                t.ladder.wins = row.wins;
                t.ladder.draws = row.draws;
                t.ladder.losses = row.losses;
                t.ladder.byes = row.byes;
                t.ladder.goals_for = row.goals_for;
                t.ladder.goals_against = row.goals_against;
                t.ladder.goal_diff = row.goal_diff;
                t.ladder.snapshot_at = Some(now);
            })
                .await;

            store
                .put_ladder_cache(LadderCacheEntry {
                team_id: team.id.clone(),
                grade_id: team.grade_id.clone(),
                ladder: snapshot.ladder,
                cached_at: now,
            })
                .await;

            ok_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    })
        .await;

    let ok = ok_count.load(std::sync::atomic::Ordering::Relaxed);
    let errors = error_count.load(std::sync::atomic::Ordering::Relaxed);

    Ok(StageOutcome::ok(STAGE_NAME, ok, errors, start.elapsed().as_secs_f64()))
}
