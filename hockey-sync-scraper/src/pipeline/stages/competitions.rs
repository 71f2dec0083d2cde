//! Competitions stage. Critical: if it produces zero
//! competitions, the orchestrator aborts the run.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::classifier::classify;
use crate::error::StageError;
use crate::extractors::{extract_competitions_index, ExtractContext};
use crate::fetcher::HttpClient;
use crate::pipeline::{RunOptions, StageContext, StageOutcome};
use crate::scraper_util::extract_year;

pub const STAGE_NAME: &str = "competitions";

#[instrument(skip(ctx, opts))]
pub async fn run<C: HttpClient>(ctx: &StageContext<C>, opts: &RunOptions) -> Result<StageOutcome, StageError> {
    let start = Instant::now();
    let now = Utc::now();

    let index_url = match ctx.base_url.join("/games/") {
        Ok(u) => u,
        Err(e) => return Ok(StageOutcome::failed(STAGE_NAME, format!("bad base url: {e}"), start.elapsed().as_secs_f64())),
    };

    let html = match ctx.fetcher.fetch(index_url.clone()).await {
        Ok(html) => html,
        Err(e) => return Ok(StageOutcome::failed(STAGE_NAME, e.to_string(), start.elapsed().as_secs_f64())),
    };

    let extract_ctx = ExtractContext::new(index_url);
    let (blocks, warnings) = extract_competitions_index(&html, &extract_ctx);
    for w in &warnings.0 {
        warn!("{w}");
    }

    if blocks.is_empty() {
        return Ok(StageOutcome::failed(
            STAGE_NAME,
            "competitions index produced zero competitions",
            start.elapsed().as_secs_f64(),
        ));
    }

    let mut ok_count = 0u64;
    let error_count = warnings.0.len() as u64;

    for block in &blocks {
        if let Some(comp_id) = &opts.comp_id {
            if comp_id != &block.parent_comp_id {
                continue;
            }
        }

        let comp_type = classify(&block.name).0;
        if !opts.dry_run {
            ctx.store
                .upsert_competition(&block.parent_comp_id, now, |c| {
                c.name = block.name.clone();
                c.season = extract_year(&block.name).unwrap_or_else(|| now.format("%Y").to_string());
                c.comp_type = Some(comp_type);
                c.active = true;
                c.last_checked = Some(now);
            })
                .await;
        }
        ok_count += 1;

        for grade in &block.grades {
            let (grade_type, gender) = classify(&grade.grade_name);
            let grade_id = grade.fixture_id.clone();
            let comp_url = extract_ctx
                .resolve(&grade.url)
                .map(|u| u.to_string())
                .unwrap_or_else(|| grade.url.clone());

            if !opts.dry_run {
                ctx.store
                    .upsert_grade(&grade_id, now, |g| {
                    g.name = grade.grade_name.clone();
                    g.parent_comp_id = grade.comp_id.clone();
                    g.fixture_id = grade.fixture_id.clone();
                    g.comp_url = comp_url.clone();
                    g.grade_type = grade_type;
                    g.gender = gender;
                    g.season = extract_year(&grade.grade_name).unwrap_or_else(|| now.format("%Y").to_string());
                    g.active = true;
                    g.last_checked = Some(now);
                })
                    .await;
            }
            ok_count += 1;
        }
    }

    info!(competitions = blocks.len(), "competitions stage complete");

    Ok(StageOutcome::ok(STAGE_NAME, ok_count, error_count, start.elapsed().as_secs_f64()))
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

    #[tokio::test]
    async fn empty_index_marks_stage_failed() {
        let ctx = test_ctx("<html><body></body></html>");
        let outcome = run(&ctx, &RunOptions::new()).await.unwrap();
        assert!(!outcome.success);
        assert!(ctx.store.list_competitions().await.is_empty());
    }

    #[tokio::test]
    async fn upserts_competitions_and_grades() {
        let html = r#"
  <html><body>
  <h2>Senior Competition 2025 <a href="/reports/games/22076">Draws</a></h2>
  <div><a href="/games/22076/37393">Men's Pennant B</a></div>
  </body></html>
  "#;
        let ctx = test_ctx(html);
        let outcome = run(&ctx, &RunOptions::new()).await.unwrap();
        assert!(outcome.success);

        let comps = ctx.store.list_competitions().await;
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].season, "2025");

        let grades = ctx.store.list_grades().await;
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].grade_type, crate::model::TeamType::Senior);
        assert_eq!(grades[0].gender, crate::model::Gender::Men);
    }

    #[tokio::test]
    async fn dry_run_suppresses_writes() {
        let html = r#"
  <html><body>
  <h2>Senior Competition 2025 <a href="/reports/games/22076">Draws</a></h2>
  <div><a href="/games/22076/37393">Men's Pennant B</a></div>
  </body></html>
  "#;
        let ctx = test_ctx(html);
        let mut opts = RunOptions::new();
        opts.dry_run = true;
        let outcome = run(&ctx, &opts).await.unwrap();
        assert!(outcome.success);
        assert!(ctx.store.list_competitions().await.is_empty());
    }
}
