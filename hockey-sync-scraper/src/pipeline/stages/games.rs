//! Games/draw stage.
//!
//! Walks each in-scope grade's round pages starting at round 1, stopping
//! after three consecutive empty rounds or `opts.max_rounds`, whichever
//! comes first.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::StageError;
use crate::extractors::{extract_round, ExtractContext, GameCard};
use crate::fetcher::HttpClient;
use crate::model::{GameStatus, TeamRef};
use crate::pipeline::{RunOptions, StageContext, StageOutcome};

pub const STAGE_NAME: &str = "games";

const CONSECUTIVE_EMPTY_LIMIT: u32 = 3;

#[instrument(skip(ctx, opts))]
pub async fn run<C: HttpClient>(ctx: &StageContext<C>, opts: &RunOptions) -> Result<StageOutcome, StageError> {
    let start = Instant::now();

    let focus_teams = ctx.store.list_focus_club_teams().await;
    if focus_teams.is_empty() {
        return Ok(StageOutcome::failed(
            STAGE_NAME,
            "no focus-club teams known; run the teams stage first",
            start.elapsed().as_secs_f64(),
        ));
    }
    let focus_team_ids: HashSet<String> = focus_teams.iter().map(|t| t.id.clone()).collect();

    let mut grade_ids: Vec<(String, String)> = focus_teams
        .iter()
        .filter(|t| opts.team_id.as_deref().map_or(true, |id| id == t.id))
        .filter(|t| opts.comp_id.as_deref().map_or(true, |id| id == t.comp_id))
        .filter(|t| opts.grade_id.as_deref().map_or(true, |id| id == t.grade_id))
        .map(|t| (t.grade_id.clone(), t.comp_id.clone()))
        .collect();
    grade_ids.sort();
    grade_ids.dedup_by(|a, b| a.0 == b.0);

    let mut ok_count = 0u64;
    let mut error_count = 0u64;

    for (grade_id, comp_id) in grade_ids {
        let Some(grade) = ctx.store.get_grade(&grade_id).await else {
            warn!("games stage: grade {grade_id} not found in store, skipping");
            error_count += 1;
            continue;
        };

        let mut round = 1u32;
        let mut consecutive_empty = 0u32;
        let mut pages_fetched = 0u32;

        while round <= opts.max_rounds && consecutive_empty < CONSECUTIVE_EMPTY_LIMIT {
            let url = match ctx.base_url.join(&format!("/games/{}/{}/round/{}", comp_id, grade.fixture_id, round)) {
                Ok(u) => u,
                Err(e) => {
                    warn!("bad round url for grade {grade_id} round {round}: {e}");
                    error_count += 1;
                    break;
                }
            };

            pages_fetched += 1;
            let html = match ctx.fetcher.fetch(url.clone()).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("failed to fetch round {round} for grade {grade_id}: {e}");
                    error_count += 1;
                    consecutive_empty += 1;
                    round += 1;
                    continue;
                }
            };

            let extract_ctx = ExtractContext::new(url);
            let (cards, warnings) = extract_round(&html, round, &extract_ctx);
            for w in &warnings.0 {
                warn!("{w}");
            }
            error_count += warnings.0.len() as u64;

            if cards.is_empty() {
                consecutive_empty += 1;
                round += 1;
                continue;
            }
            consecutive_empty = 0;

            for card in &cards {
                if !opts.dry_run {
                    upsert_card(ctx, &comp_id, &grade_id, card, &focus_team_ids).await;
                }
                ok_count += 1;
                if let Some(limit) = opts.limit_games {
                    if ok_count as usize >= limit {
                        break;
                    }
                }
            }

            round += 1;
        }

        info!(grade = %grade_id, pages_fetched, "games stage finished grade");
    }

    Ok(StageOutcome::ok(STAGE_NAME, ok_count, error_count, start.elapsed().as_secs_f64()))
}

async fn upsert_card<C: HttpClient>(ctx: &StageContext<C>, comp_id: &str, grade_id: &str, card: &GameCard, focus_team_ids: &HashSet<String>) {
    let now = Utc::now();
    let mentone_playing = card.home.hv_id.as_deref().is_some_and(|id| focus_team_ids.contains(id))
    || card.away.hv_id.as_deref().is_some_and(|id| focus_team_ids.contains(id));

    let status = match card.score {
        Some(_) => GameStatus::Completed,
        None => GameStatus::Scheduled,
    };

    ctx.store
        .upsert_game(&card.game_id, now, |g| {
        g.comp_id = comp_id.to_string();
        g.grade_id = grade_id.to_string();
        g.round = card.round;
        g.scheduled_at = card.scheduled_at;
        g.venue_name = card.venue_name.clone();
        g.venue_code = card.venue_code.clone();
        g.home_team = TeamRef {
            team_id: card.home.hv_id.clone().unwrap_or_default(),
            name: card.home.name.clone(),
            score: card.score.map(|(h, _)| h),
        };
        g.away_team = TeamRef {
            team_id: card.away.hv_id.clone().unwrap_or_default(),
            name: card.away.name.clone(),
            score: card.score.map(|(_, a)| a),
        };
        if status == GameStatus::Completed {
            g.status = status;
        }
        g.mentone_playing = mentone_playing;
        g.last_checked = Some(now);
    })
        .await;
}
