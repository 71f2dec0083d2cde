//! Results stage.
//!
//! Only ever writes `{status, home_team.score, away_team.score, winner_text,
//! mentone_result, results_retrieved_at}` on a Game already created by the
//! games stage. On a
//! forfeit/cancellation with no scoreline present, `mentone_result` is left
//! untouched rather than guessed.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::StageError;
use crate::extractors::{extract_game_detail, extract_venue, ExtractContext};
use crate::fetcher::HttpClient;
use crate::model::MentoneResult;
use crate::pipeline::staleness::{games_needing_results, DEFAULT_RESULTS_DAYS_BACK};
use crate::pipeline::{RunOptions, StageContext, StageOutcome};

pub const STAGE_NAME: &str = "results";

#[instrument(skip(ctx, opts))]
pub async fn run<C: HttpClient>(ctx: &StageContext<C>, opts: &RunOptions) -> Result<StageOutcome, StageError> {
    let start = Instant::now();
    let now = Utc::now();

    let focus_team_ids: HashSet<String> = ctx.store.list_focus_club_teams().await.into_iter().map(|t| t.id).collect();

    let all_games = ctx.store.list_games().await;
    let days_back = opts.days.unwrap_or(DEFAULT_RESULTS_DAYS_BACK);
    let mut due = games_needing_results(&all_games, now, days_back, opts.force_update);
    if let Some(limit) = opts.limit_games {
        due.truncate(limit);
    }

    let mut ok_count = 0u64;
    let mut error_count = 0u64;

    for game in due {
        let url = match ctx.base_url.join(&format!("/game/{}", game.id)) {
            Ok(u) => u,
            Err(e) => {
                warn!("bad game url for {}: {e}", game.id);
                error_count += 1;
                continue;
            }
        };

        let html = match ctx.fetcher.fetch(url.clone()).await {
            Ok(html) => html,
            Err(e) => {
                warn!("failed to fetch result for game {}: {e}", game.id);
                error_count += 1;
                continue;
            }
        };

        let extract_ctx = ExtractContext::new(url);
        let (detail, warnings) = extract_game_detail(&html, &extract_ctx);
        for w in &warnings.0 {
            warn!("{w}");
        }
        error_count += warnings.0.len() as u64;

        let (venue, venue_warnings) = extract_venue(&html, &extract_ctx);
        error_count += venue_warnings.0.len() as u64;

        if opts.dry_run {
            ok_count += 1;
            continue;
        }

        let home_is_focus = focus_team_ids.contains(&game.home_team.team_id);
        let away_is_focus = focus_team_ids.contains(&game.away_team.team_id);
        let mentone_result = match (detail.home_score, detail.away_score) {
            (Some(h), Some(a)) if home_is_focus || away_is_focus => {
                let (us, them) = if home_is_focus { (h, a) } else { (a, h) };
                Some(match us.cmp(&them) {
                    std::cmp::Ordering::Greater => MentoneResult::Win,
                    std::cmp::Ordering::Less => MentoneResult::Loss,
                    std::cmp::Ordering::Equal => MentoneResult::Draw,
                })
            }
            _ => None,
        };

        ctx.store
            .upsert_game(&game.id, now, |g| {
            g.status = detail.status;
            if let Some(h) = detail.home_score {
                g.home_team.score = Some(h);
            }
            if let Some(a) = detail.away_score {
                g.away_team.score = Some(a);
            }
            g.winner_text = detail.winner_text.clone();
            if let Some(result) = mentone_result {
                g.mentone_result = Some(result);
            }
            g.results_retrieved_at = Some(now);
        })
            .await;

        if let Some(venue_info) = venue {
            let venue_id = venue_info.slug();
            ctx.store
                .upsert_venue(&venue_id, now, |v| {
                v.name = venue_info.name.clone();
                v.address = venue_info.address.clone();
                v.field_code = venue_info.field_code.clone();
                v.map_url = venue_info.map_url.clone();
                if !v.source_game_urls.contains(&game.id) {
                    v.source_game_urls.push(game.id.clone());
                }
            })
                .await;
        }

        ok_count += 1;
    }

    info!(ok_count, error_count, "results stage complete");

    Ok(StageOutcome::ok(STAGE_NAME, ok_count, error_count, start.elapsed().as_secs_f64()))
}
