//! Teams stage. Critical: if it fails, later stages
//! must not run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{instrument, warn};

use crate::classifier::{classify, club_key, derive_club_name, is_focus_club};
use crate::error::StageError;
use crate::extractors::{extract_ladder, ExtractContext};
use crate::fetcher::HttpClient;
use crate::model::LadderSnapshot;
use crate::pipeline::{for_each_bounded, RunOptions, StageContext, StageOutcome};

pub const STAGE_NAME: &str = "teams";

#[instrument(skip(ctx, opts))]
pub async fn run<C: HttpClient + Clone + 'static>(ctx: &StageContext<C>, opts: &RunOptions) -> Result<StageOutcome, StageError> {
    let start = Instant::now();

    let mut grades = ctx.store.list_grades().await;
    grades.retain(|g| g.active);
    if let Some(comp_id) = &opts.comp_id {
        grades.retain(|g| &g.parent_comp_id == comp_id);
    }
    if let Some(grade_id) = &opts.grade_id {
        grades.retain(|g| &g.id == grade_id);
    }
    if let Some(limit) = opts.limit_teams {
        grades.truncate(limit);
    }

    if grades.is_empty() {
        return Ok(StageOutcome::failed(
            STAGE_NAME,
            "no grades available to scan for teams",
            start.elapsed().as_secs_f64(),
        ));
    }

    let ok_count = Arc::new(AtomicU64::new(0));
    let error_count = Arc::new(AtomicU64::new(0));

    let store = ctx.store.clone();
    let fetcher = ctx.fetcher.clone();
    let base_url = ctx.base_url.clone();
    let focus_keyword = ctx.focus_keyword.clone();
    let dry_run = opts.dry_run;
    let concurrency = ctx.concurrency;

    let ok_count_task = ok_count.clone();
    let error_count_task = error_count.clone();

    for_each_bounded(grades, concurrency, move |grade| {
        let store = store.clone();
        let fetcher = fetcher.clone();
        let base_url = base_url.clone();
        let focus_keyword = focus_keyword.clone();
        let ok_count = ok_count_task.clone();
        let error_count = error_count_task.clone();

        async move {
            let now = Utc::now();
            let url = match base_url.join(&format!("/pointscore/{}/{}", grade.parent_comp_id, grade.fixture_id)) {
                Ok(u) => u,
                Err(e) => {
                    warn!("bad pointscore url for grade {}: {e}", grade.id);
                    error_count.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            let html = match fetcher.fetch(url.clone()).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("failed to fetch ladder for grade {}: {e}", grade.id);
                    error_count.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            let extract_ctx = ExtractContext::new(url);
            let (rows, warnings) = extract_ladder(&html, &extract_ctx);
            for w in &warnings.0 {
                warn!("{w}");
            }
            error_count.fetch_add(warnings.0.len() as u64, Ordering::Relaxed);

            for row in rows {
                let Some(team_id) = row.team_hv_id.clone() else {
                    warn!("ladder row for grade {} has no team id, skipping: {}", grade.id, row.team_name);
                    error_count.fetch_add(1, Ordering::Relaxed);
                    continue;
                };

                let club_name = derive_club_name(&row.team_name);
                let club_id = club_key(&club_name);
                let is_home_club = is_focus_club(&row.team_name, &focus_keyword);
                let (team_type, gender) = classify(&grade.name);

                if !dry_run {
                    store
                        .upsert_club(&club_id, now, |c| {
                        c.display_name = club_name.clone();
                        c.short_name = club_name.clone();
                        c.is_focus_club = is_home_club || c.is_focus_club;
                    })
                        .await;

                    store
                        .upsert_team(&team_id, now, |t| {
                        t.display_name = row.team_name.clone();
                        t.club_key = club_id.clone();
                        t.club_name = club_name.clone();
                        t.comp_id = grade.parent_comp_id.clone();
                        t.grade_id = grade.id.clone();
                        t.is_home_club = is_home_club;
                        t.team_type = team_type;
                        t.gender = gender;
                        t.season = grade.season.clone();
                        t.active = true;
                        t.last_checked = Some(now);
                        t.ladder = LadderSnapshot {
                            position: row.position,
                            points: row.points,
                            played: row.played,
                            wins: row.wins,
                            draws: row.draws,
                            losses: row.losses,
                            byes: row.byes,
                            goals_for: row.goals_for,
                            goals_against: row.goals_against,
                            goal_diff: row.goal_diff,
                            snapshot_at: Some(now),
                        };
                    })
                        .await;
                }

                ok_count.fetch_add(1, Ordering::Relaxed);
            }

            if !dry_run {
                store
                    .upsert_grade(&grade.id, now, |g| {
                    g.last_checked = Some(now);
                })
                    .await;
            }
        }
    })
        .await;

    let ok = ok_count.load(Ordering::Relaxed);
    let errors = error_count.load(Ordering::Relaxed);

    if ok == 0 {
        return Ok(StageOutcome::failed(STAGE_NAME, "no teams discovered across any grade", start.elapsed().as_secs_f64()));
    }

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

    async fn seed_grade(store: &Store) {
        let now = Utc::now();
        store
            .upsert_grade("37393", now, |g| {
            g.name = "Men's Pennant B".to_string();
            g.parent_comp_id = "22076".to_string();
            g.fixture_id = "37393".to_string();
            g.season = "2025".to_string();
            g.active = true;
        })
            .await;
    }

    #[tokio::test]
    async fn discovers_teams_and_focus_club() {
        let html = r#"
  <html><body><table>
  <tr><th>Team</th><th>P</th><th>W</th><th>D</th><th>L</th><th>B</th><th>GF</th><th>GA</th><th>GD</th><th>Pts</th></tr>
  <tr>
  <td><a href="/games/team/22076/337089">1. Mentone</a></td>
  <td>10</td><td>8</td><td>1</td><td>1</td><td>0</td>
  <td>32</td><td>11</td><td>21</td><td>25</td>
  </tr>
  <tr>
  <td><a href="/games/team/22076/337090">2. Camberwell</a></td>
  <td>10</td><td>5</td><td>1</td><td>4</td><td>0</td>
  <td>20</td><td>18</td><td>2</td><td>16</td>
  </tr>
  </table></body></html>
  "#;
        let ctx = test_ctx(html);
        seed_grade(&ctx.store).await;

        let outcome = run(&ctx, &RunOptions::new()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.ok_count, 2);

        let teams = ctx.store.list_teams().await;
        assert_eq!(teams.len(), 2);
        let mentone = teams.iter().find(|t| t.id == "337089").unwrap();
        assert!(mentone.is_home_club);
        assert_eq!(mentone.ladder.position, 1);
        let camberwell = teams.iter().find(|t| t.id == "337090").unwrap();
        assert!(!camberwell.is_home_club);
    }

    #[tokio::test]
    async fn no_grades_fails_the_stage() {
        let ctx = test_ctx("<html></html>");
        let outcome = run(&ctx, &RunOptions::new()).await.unwrap();
        assert!(!outcome.success);
    }
}
