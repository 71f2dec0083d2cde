//! Team-stats extractor.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::instrument;

use super::{ExtractContext, Warnings};
use crate::model::PlayerRole;
use crate::scraper_util::{elem_text, extract_int, path_digit_segments};

static PLAYER_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/games/statistics/(\d+)").unwrap());
static GAME_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/game/(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub player_hv_id: String,
    pub name: String,
    pub role: PlayerRole,
    pub games_played: u32,
    pub goals: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TeamStatsPage {
    pub game_urls: Vec<String>,
    pub roster: Vec<RosterEntry>,
}

/// Parses a team stats page into the set of game URLs it references and its
/// roster table(s). A table's header set mentioning "GK"/"goalkeeping"
/// marks every player in that table as [`PlayerRole::Goalkeeper`]; all other
/// roster tables are [`PlayerRole::Field`].
#[instrument(skip(html))]
pub fn extract_team_stats(html: &str, ctx: &ExtractContext) -> (TeamStatsPage, Warnings) {
    let doc = Html::parse_document(html);
    let table_selector = Selector::parse("table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let header_selector = Selector::parse("th").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    let link_selector = Selector::parse("a").unwrap();

    let mut game_urls = BTreeSet::new();
    for a in doc.select(&link_selector) {
        if let Some(href) = a.value().attr("href") {
            if GAME_LINK_RE.is_match(href) {
                if let Some(resolved) = ctx.resolve(href) {
                    game_urls.insert(resolved.to_string());
                }
            }
        }
    }

    let mut roster = vec![];
    let mut warnings = Warnings::default();

    for table in doc.select(&table_selector) {
        let mut rows = table.select(&row_selector);
        let Some(header_row) = rows.next() else { continue };
        let headers: Vec<String> = header_row.select(&header_selector).map(|h| elem_text(h).to_lowercase()).collect();
        if headers.is_empty() {
            continue;
        }
        let is_goalkeeper_table = headers.iter().any(|h| h.contains("gk") || h.contains("goalkeep"));
        let name_idx = 0usize;
        let games_idx = headers.iter().position(|h| h.contains("played") || h == "p");
        let goals_idx = headers.iter().position(|h| h.contains("goal"));

        for row in rows {
            let cells: Vec<_> = row.select(&cell_selector).collect();
            if cells.len() <= name_idx {
                continue;
            }

            let name_cell = cells[name_idx];
            let player_link = name_cell.select(&link_selector).next();
            let Some(player_hv_id) = player_link
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| {
                PLAYER_LINK_RE
                    .captures(href)
                    .map(|c| c[1].to_string())
                    .or_else(|| path_digit_segments(href).last().map(|s| s.to_string()))
            })
            else {
                warnings.push("team_stats", elem_text(name_cell), "roster row missing player link/id");
                continue;
            };

            let name = player_link.map(elem_text).unwrap_or_else(|| elem_text(name_cell));
            let games_played = games_idx
                .and_then(|i| cells.get(i))
                .and_then(|c| extract_int(&elem_text(*c)))
                .unwrap_or(0) as u32;
            let goals = goals_idx
                .and_then(|i| cells.get(i))
                .and_then(|c| extract_int(&elem_text(*c)))
                .unwrap_or(0) as u32;

            roster.push(RosterEntry {
                player_hv_id,
                name,
                role: if is_goalkeeper_table { PlayerRole::Goalkeeper } else { PlayerRole::Field },
                games_played,
                goals,
            });
        }
    }

    (
        TeamStatsPage {
            game_urls: game_urls.into_iter().collect(),
            roster,
        },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> ExtractContext {
        ExtractContext::new(Url::parse("https://www.hockeyvictoria.org.au/games/team-stats/22076?team=337089").unwrap())
    }

    #[test]
    fn extracts_field_and_goalkeeper_rosters_and_game_urls() {
        let html = r#"
  <html><body>
  <a href="/game/2048530">Round 1</a>
  <a href="/game/2048531">Round 2</a>
  <table>
  <tr><th>Player</th><th>Played</th><th>Goals</th></tr>
  <tr><td><a href="/games/statistics/900001">Jane Smith</a></td><td>8</td><td>4</td></tr>
  </table>
  <table>
  <tr><th>Player</th><th>GK Played</th><th>Goals</th></tr>
  <tr><td><a href="/games/statistics/900002">Sam Keeper</a></td><td>8</td><td>0</td></tr>
  </table>
  </body></html>
  "#;

        let (page, warnings) = extract_team_stats(html, &ctx());
        assert!(warnings.0.is_empty());
        assert_eq!(page.game_urls.len(), 2);
        assert_eq!(page.roster.len(), 2);
        assert_eq!(page.roster[0].role, PlayerRole::Field);
        assert_eq!(page.roster[0].games_played, 8);
        assert_eq!(page.roster[1].role, PlayerRole::Goalkeeper);
    }
}
