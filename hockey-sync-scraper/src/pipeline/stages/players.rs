//! Players stage.
//!
//! For each focus-club team, the team-stats page gives a roster (name,
//! role, season-cumulative games/goals) plus the set of game URLs the team
//! has played. Each game's participation table gives per-game card counts,
//! which are summed across every game visited this run and written onto
//! the player's `stats` alongside the roster's season totals. Also updates
//! each visited `Game.participation` list.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use tracing::{instrument, warn};

use crate::error::StageError;
use crate::extractors::{extract_participation, extract_team_stats, ExtractContext, RosterEntry};
use crate::fetcher::HttpClient;
use crate::model::{GameParticipant, PlayerTeamRef};
use crate::pipeline::{for_each_bounded, RunOptions, StageContext, StageOutcome};

pub const STAGE_NAME: &str = "players";

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
            let url = match base_url.join(&format!("/games/team-stats/{}?team={}", team.comp_id, team.id)) {
                Ok(u) => u,
                Err(e) => {
                    warn!("bad team-stats url for team {}: {e}", team.id);
                    error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    return;
                }
            };

            let html = match fetcher.fetch(url.clone()).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("failed to fetch team-stats for team {}: {e}", team.id);
                    error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    return;
                }
            };

            let extract_ctx = ExtractContext::new(url);
            let (page, warnings) = extract_team_stats(&html, &extract_ctx);
            for w in &warnings.0 {
                warn!("{w}");
            }
            error_count.fetch_add(warnings.0.len() as u64, std::sync::atomic::Ordering::Relaxed);

            let roster_by_id: HashMap<String, RosterEntry> =
            page.roster.iter().cloned().map(|r| (r.player_hv_id.clone(), r)).collect();

            let mut card_totals: HashMap<String, (u32, u32, u32)> = HashMap::new();

            for game_url in &page.game_urls {
                let game_url = match url::Url::parse(game_url) {
                    Ok(u) => u,
                    Err(e) => {
                        warn!("bad game url {game_url} from team-stats page: {e}");
                        error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        continue;
                    }
                };

                let game_html = match fetcher.fetch(game_url.clone()).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!("failed to fetch game {game_url} for participation: {e}");
                        error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        continue;
                    }
                };

                let game_id = game_url.path_segments().and_then(|mut s| s.next_back()).unwrap_or_default().to_string();
                let participation_ctx = ExtractContext::new(game_url);
                let (participants, p_warnings) = extract_participation(&game_html, &participation_ctx);
                error_count.fetch_add(p_warnings.0.len() as u64, std::sync::atomic::Ordering::Relaxed);

                for p in &participants {
                    let entry = card_totals.entry(p.player_hv_id.clone()).or_insert((0, 0, 0));
                    entry.0 += p.green_cards;
                    entry.1 += p.yellow_cards;
                    entry.2 += p.red_cards;
                }

                if !dry_run && !participants.is_empty() {
                    let participation: Vec<GameParticipant> = participants
                        .iter()
                        .map(|p| GameParticipant {
                        player_id: p.player_hv_id.clone(),
                        name: p.name.clone(),
                        goals: p.goals,
                        green_cards: p.green_cards,
                        yellow_cards: p.yellow_cards,
                        red_cards: p.red_cards,
                    })
                        .collect();
                    let now = Utc::now();
                    store
                        .upsert_game(&game_id, now, |g| {
                        g.participation = participation;
                    })
                        .await;
                }
            }

            if dry_run {
                ok_count.fetch_add(roster_by_id.len() as u64, std::sync::atomic::Ordering::Relaxed);
                return;
            }

            let now = Utc::now();
            for (player_id, roster) in &roster_by_id {
                let (green, yellow, red) = card_totals.get(player_id).copied().unwrap_or((0, 0, 0));
                let team_ref = PlayerTeamRef {
                    team_id: team.id.clone(),
                    team_name: team.display_name.clone(),
                    grade_id: team.grade_id.clone(),
                };

                store
                    .upsert_player(player_id, now, |pl| {
                    pl.display_name = roster.name.clone();
                    pl.role = roster.role;
                    pl.gender = team.gender;
                    if !pl.teams.iter().any(|t| t.team_id == team_ref.team_id) {
                        pl.teams.push(team_ref.clone());
                    }
                    pl.stats.games_played = roster.games_played;
                    pl.stats.goals = roster.goals;
                    pl.stats.green_cards = green;
                    pl.stats.yellow_cards = yellow;
                    pl.stats.red_cards = red;
                    pl.last_checked = Some(now);
                })
                    .await;
                ok_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
    })
        .await;

    let ok = ok_count.load(std::sync::atomic::Ordering::Relaxed);
    let errors = error_count.load(std::sync::atomic::Ordering::Relaxed);

    Ok(StageOutcome::ok(STAGE_NAME, ok, errors, start.elapsed().as_secs_f64()))
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
    struct RoutedClient {
        team_stats_html: String,
        game_html: String,
    }
    impl HttpClient for RoutedClient {
        type Error = FakeErr;
        type Future = Pin<Box<dyn Future<Output = Result<(u16, String), Self::Error>> + Send>>;
        fn get(&self, url: Url) -> Self::Future {
            let body = if url.path().starts_with("/games/team-stats") {
                self.team_stats_html.clone()
            } else {
                self.game_html.clone()
            };
            Box::pin(async move { Ok((200, body)) })
        }
    }

    fn test_ctx(team_stats_html: &str, game_html: &str) -> StageContext<RoutedClient> {
        let fetcher = Fetcher::new(
            RoutedClient {
                team_stats_html: team_stats_html.to_string(),
                game_html: game_html.to_string(),
            },
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

    async fn seed_focus_team(store: &Store) {
        let now = Utc::now();
        store
            .upsert_team("337089", now, |t| {
            t.display_name = "Mentone".to_string();
            t.comp_id = "22076".to_string();
            t.grade_id = "37393".to_string();
            t.is_home_club = true;
            t.active = true;
        })
            .await;
    }

    #[tokio::test]
    async fn aggregates_roster_and_card_totals() {
        let team_stats_html = r#"
  <html><body>
  <a href="/game/2048530">Round 1</a>
  <table>
  <tr><th>Player</th><th>Played</th><th>Goals</th></tr>
  <tr><td><a href="/games/statistics/900001">Jane Smith</a></td><td>8</td><td>4</td></tr>
  </table>
  </body></html>
  "#;
        let game_html = r#"
  <html><body>
  <table class="game-participation">
  <tr><th>Player</th><th>Goals</th><th>Green</th><th>Yellow</th><th>Red</th></tr>
  <tr>
  <td><a href="/games/statistics/900001">Jane Smith</a></td>
  <td>2</td><td>1</td><td>0</td><td>0</td>
  </tr>
  </table>
  </body></html>
  "#;
        let ctx = test_ctx(team_stats_html, game_html);
        seed_focus_team(&ctx.store).await;

        let outcome = run(&ctx, &RunOptions::new()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.ok_count, 1);

        let players = ctx.store.list_players().await;
        assert_eq!(players.len(), 1);
        let jane = &players[0];
        assert_eq!(jane.display_name, "Jane Smith");
        assert_eq!(jane.stats.games_played, 8);
        assert_eq!(jane.stats.goals, 4);
        assert_eq!(jane.stats.green_cards, 1);
        assert_eq!(jane.teams.len(), 1);

        let game = ctx.store.get_game("2048530").await.unwrap();
        assert_eq!(game.participation.len(), 1);
        assert_eq!(game.participation[0].player_id, "900001");
    }
}
