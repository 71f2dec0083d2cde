//! Draw/round extractor.
//!
//! Assumed page shape: a round page lays out one `div.fixture-card` per
//! scheduled game, each carrying a `/game/{id}` link, a concatenated
//! "Day DD Mon YYYY HH:MM" date token, a venue block, and two team blocks
//! (`.fixture-team.home` / `.fixture-team.away`) each linking to
//! `/games/team/{comp}/{team}`.

use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Australia::Melbourne;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::instrument;

use super::{ExtractContext, Warnings};
use crate::scraper_util::{clean_text, elem_text, extract_int, path_digit_segments};

static GAME_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/game/(\d+)").unwrap());
static TEAM_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/games/team/\d+/(\d+)").unwrap());
static DATE_TOKEN_RE: LazyLock<Regex> =
LazyLock::new(|| Regex::new(r"[A-Za-z]{3}\s+\d{1,2}\s+[A-Za-z]{3}\s+\d{4}\s+\d{1,2}:\d{2}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTeam {
    pub name: String,
    pub hv_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCard {
    pub game_id: String,
    pub game_url: String,
    pub round: u32,
    /// UTC instant converted from the site's implicit Australia/Melbourne
    /// local time, or `None` if no date token could be parsed.
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub venue_name: Option<String>,
    pub venue_code: Option<String>,
    pub home: CardTeam,
    pub away: CardTeam,
    /// In-card score, if the round page already shows it, as `(home, away)`.
    pub score: Option<(i32, i32)>,
    pub status_token: Option<String>,
}

fn parse_team(el: scraper::ElementRef, link_selector: &Selector) -> CardTeam {
    let link = el.select(link_selector).next();
    let name = link.map(elem_text).unwrap_or_else(|| elem_text(el));
    let hv_id = link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| {
        TEAM_LINK_RE
            .captures(href)
            .map(|c| c[1].to_string())
            .or_else(|| path_digit_segments(href).last().map(|s| s.to_string()))
    });
    CardTeam { name, hv_id }
}

fn parse_scheduled_at(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let token = DATE_TOKEN_RE.find(text)?.as_str();
    let naive = NaiveDateTime::parse_from_str(token, "%a %d %b %Y %H:%M").ok()?;
    let melbourne = Melbourne.from_local_datetime(&naive).single()?;
    Some(melbourne.with_timezone(&chrono::Utc))
}

/// Parses one round page into its game cards. Callers drive the "three
/// consecutive empty rounds" termination rule; this
/// function just reports how many cards it found for `round`.
#[instrument(skip(html))]
pub fn extract_round(html: &str, round: u32, ctx: &ExtractContext) -> (Vec<GameCard>, Warnings) {
    let doc = Html::parse_document(html);
    let card_selector = Selector::parse("div.fixture-card").unwrap();
    let game_link_selector = Selector::parse(r#"a[href*="/game/"]"#).unwrap();
    let team_link_selector = Selector::parse("a").unwrap();
    let date_selector = Selector::parse(".fixture-date").unwrap();
    let venue_selector = Selector::parse(".fixture-venue").unwrap();
    let field_code_selector = Selector::parse(".field-code").unwrap();
    let home_selector = Selector::parse(".fixture-team.home").unwrap();
    let away_selector = Selector::parse(".fixture-team.away").unwrap();
    let score_selector = Selector::parse(".fixture-score").unwrap();
    let status_selector = Selector::parse(".fixture-status").unwrap();

    let mut cards = vec![];
    let mut warnings = Warnings::default();

    for card in doc.select(&card_selector) {
        let parse = || -> Result<GameCard, String> {
            let game_link = card
                .select(&game_link_selector)
                .next()
                .ok_or_else(|| "missing game detail link".to_string())?;
            let href = game_link.value().attr("href").unwrap_or_default();
            let game_id = GAME_LINK_RE
                .captures(href)
                .map(|c| c[1].to_string())
                .ok_or_else(|| format!("could not extract game id from {href}"))?;
            let game_url = ctx
                .resolve(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|| href.to_string());

            let date_text = card.select(&date_selector).next().map(elem_text).unwrap_or_default();
            let scheduled_at = parse_scheduled_at(&date_text);

            let venue_el = card.select(&venue_selector).next();
            let venue_name = venue_el
                .and_then(|v| v.children().find_map(|n| n.value().as_text()))
                .map(|t| t.trim().to_string())
                .filter(|s| !s.is_empty());
            let venue_code = venue_el
                .and_then(|v| v.select(&field_code_selector).next())
                .map(elem_text)
                .filter(|s| !s.is_empty());

            let home = card
                .select(&home_selector)
                .next()
                .map(|e| parse_team(e, &team_link_selector))
                .ok_or_else(|| "missing home team".to_string())?;
            let away = card
                .select(&away_selector)
                .next()
                .map(|e| parse_team(e, &team_link_selector))
                .ok_or_else(|| "missing away team".to_string())?;

            let score = card.select(&score_selector).next().and_then(|s| {
                let text = clean_text(&s.text().collect::<String>());
                let mut parts = text.split('-');
                let h = extract_int(parts.next()?)?;
                let a = extract_int(parts.next()?)?;
                Some((h as i32, a as i32))
            });

            let status_token = card
                .select(&status_selector)
                .next()
                .map(elem_text)
                .filter(|s| !s.is_empty());

            Ok(GameCard {
                game_id,
                game_url,
                round,
                scheduled_at,
                venue_name,
                venue_code,
                home,
                away,
                score,
                status_token,
            })
        };

        match parse() {
            Ok(card) => cards.push(card),
            Err(reason) => warnings.push("draw_round", card.html(), reason),
        }
    }

    (cards, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> ExtractContext {
        ExtractContext::new(Url::parse("https://www.hockeyvictoria.org.au/games/22076/37393/round/4").unwrap())
    }

    fn sample_card(extra_score: &str, extra_status: &str) -> String {
        format!(
            r#"
  <div class="fixture-card">
  <a href="/game/2048530">Game details</a>
  <div class="fixture-date">Sat 12 Apr 2025 09:00</div>
  <div class="fixture-venue">Mentone Grammar<span class="field-code">F1</span></div>
  <div class="fixture-team home"><a href="/games/team/22076/337089">Mentone</a></div>
  <div class="fixture-team away"><a href="/games/team/22076/337090">Camberwell</a></div>
  {extra_score}
  {extra_status}
  </div>
  "#
        )
    }

    #[test]
    fn extracts_a_fully_populated_card() {
        let html = format!(
            "<html><body>{}</body></html>",
            sample_card(r#"<div class="fixture-score">3 - 2</div>"#, "")
        );
        let (cards, warnings) = extract_round(&html, 4, &ctx());
        assert!(warnings.0.is_empty());
        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert_eq!(card.game_id, "2048530");
        assert_eq!(card.round, 4);
        assert!(card.scheduled_at.is_some());
        assert_eq!(card.venue_name.as_deref(), Some("Mentone Grammar"));
        assert_eq!(card.venue_code.as_deref(), Some("F1"));
        assert_eq!(card.home.name, "Mentone");
        assert_eq!(card.home.hv_id.as_deref(), Some("337089"));
        assert_eq!(card.away.hv_id.as_deref(), Some("337090"));
        assert_eq!(card.score, Some((3, 2)));
    }

    #[test]
    fn no_cards_on_empty_round_page() {
        let html = "<html><body><p>No fixtures this round.</p></body></html>";
        let (cards, warnings) = extract_round(html, 5, &ctx());
        assert!(cards.is_empty());
        assert!(warnings.0.is_empty());
    }

    #[test]
    fn url_identifier_extraction() {
        let caps = GAME_LINK_RE.captures("/game/2048530").unwrap();
        assert_eq!(&caps[1], "2048530");

        let caps = TEAM_LINK_RE.captures("/games/team/22076/337089").unwrap();
        assert_eq!(&caps[1], "337089");
    }
}
