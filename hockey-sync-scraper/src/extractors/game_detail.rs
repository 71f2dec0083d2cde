//! Game-detail extractor.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::instrument;

use super::{ExtractContext, Warnings};
use crate::model::GameStatus;
use crate::scraper_util::{clean_text, elem_text};

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)").unwrap());

const SPECIAL_STATUS_KEYWORDS: [(&str, GameStatus); 5] = [
    ("forfeit", GameStatus::Forfeit),
    ("cancelled", GameStatus::Cancelled),
    ("postponed", GameStatus::Postponed),
    ("abandoned", GameStatus::Abandoned),
    ("washed out", GameStatus::WashedOut),
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameDetail {
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub winner_text: Option<String>,
    pub status: GameStatus,
}

/// Parses a game detail page for its result. The primary
/// score location is a prominent heading containing two integers separated
/// by `-`; failing that, special-status keywords are scanned for across the
/// whole page body.
#[instrument(skip(html))]
pub fn extract_game_detail(html: &str, _ctx: &ExtractContext) -> (GameDetail, Warnings) {
    let doc = Html::parse_document(html);
    let heading_selector = Selector::parse("h1").unwrap();
    let winner_selector = Selector::parse(".match-winner,.winner-text").unwrap();
    let warnings = Warnings::default();

    let mut detail = GameDetail::default();

    for heading in doc.select(&heading_selector) {
        let text = elem_text(heading);
        if let Some(caps) = SCORE_RE.captures(&text) {
            if let (Ok(h), Ok(a)) = (caps[1].parse(), caps[2].parse()) {
                detail.home_score = Some(h);
                detail.away_score = Some(a);
                break;
            }
        }
    }

    detail.winner_text = doc.select(&winner_selector).next().map(elem_text).filter(|s| !s.is_empty());

    if detail.home_score.is_some() && detail.away_score.is_some() {
        detail.status = GameStatus::Completed;
        return (detail, warnings);
    }

    let body_text = clean_text(&doc.root_element().text().collect::<String>()).to_lowercase();
    for (keyword, status) in SPECIAL_STATUS_KEYWORDS {
        if body_text.contains(keyword) {
            detail.status = status;
            return (detail, warnings);
        }
    }

    detail.status = GameStatus::UnknownOutcome;
    (detail, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> ExtractContext {
        ExtractContext::new(Url::parse("https://www.hockeyvictoria.org.au/game/2048530").unwrap())
    }

    #[test]
    fn completed_game_state_machine() {
        let html = r#"<html><body><h1>Final score: 3 - 2</h1></body></html>"#;
        let (detail, _) = extract_game_detail(html, &ctx());
        assert_eq!(detail.status, GameStatus::Completed);
        assert_eq!(detail.home_score, Some(3));
        assert_eq!(detail.away_score, Some(2));
    }

    #[test]
    fn earlier_keyword_in_table_order_wins_when_both_present() {
        let html = r#"<html><body><h1>Match abandoned</h1><p>This game resulted in a forfeit.</p></body></html>"#;
        let (detail, _) = extract_game_detail(html, &ctx());
        // no score was parsed, so the whole body is scanned against the
        // keyword table in order; "forfeit" precedes "abandoned" there, so
        // it wins even though "abandoned" appears earlier in the text.
        assert_eq!(detail.status, GameStatus::Forfeit);
        assert!(detail.home_score.is_none());
    }

    #[test]
    fn pure_forfeit_with_no_abandoned_text() {
        let html = r#"<html><body><p>This game was a forfeit.</p></body></html>"#;
        let (detail, _) = extract_game_detail(html, &ctx());
        assert_eq!(detail.status, GameStatus::Forfeit);
        assert!(detail.home_score.is_none());
        assert!(detail.away_score.is_none());
    }

    #[test]
    fn unknown_outcome_when_nothing_matches() {
        let html = r#"<html><body><p>Check back later for results.</p></body></html>"#;
        let (detail, _) = extract_game_detail(html, &ctx());
        assert_eq!(detail.status, GameStatus::UnknownOutcome);
    }
}
