//! Game-participation extractor.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::instrument;

use super::{ExtractContext, Warnings};
use crate::scraper_util::{elem_text, extract_int, path_digit_segments};

static PLAYER_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/games/statistics/(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParticipatingPlayer {
    pub player_hv_id: String,
    pub name: String,
    pub goals: u32,
    pub green_cards: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

/// Parses a game detail page's participation table(s) into per-game stats
/// for every player who appeared.
#[instrument(skip(html))]
pub fn extract_participation(html: &str, _ctx: &ExtractContext) -> (Vec<ParticipatingPlayer>, Warnings) {
    let doc = Html::parse_document(html);
    let table_selector = Selector::parse("table.game-participation, table.player-stats").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let header_selector = Selector::parse("th").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    let link_selector = Selector::parse("a").unwrap();

    let mut players = vec![];
    let mut warnings = Warnings::default();

    for table in doc.select(&table_selector) {
        let mut rows = table.select(&row_selector);
        let Some(header_row) = rows.next() else { continue };
        let headers: Vec<String> = header_row.select(&header_selector).map(|h| elem_text(h).to_lowercase()).collect();
        let goals_idx = headers.iter().position(|h| h.contains("goal"));
        let green_idx = headers.iter().position(|h| h.contains("green"));
        let yellow_idx = headers.iter().position(|h| h.contains("yellow"));
        let red_idx = headers.iter().position(|h| h.contains("red"));

        for row in rows {
            let cells: Vec<_> = row.select(&cell_selector).collect();
            if cells.is_empty() {
                continue;
            }

            let name_cell = cells[0];
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
                warnings.push("game_participation", elem_text(name_cell), "row missing player link/id");
                continue;
            };

            let name = player_link.map(elem_text).unwrap_or_else(|| elem_text(name_cell));
            let get = |idx: Option<usize>| -> u32 {
                idx.and_then(|i| cells.get(i)).and_then(|c| extract_int(&elem_text(*c))).unwrap_or(0) as u32
            };

            players.push(ParticipatingPlayer {
                player_hv_id,
                name,
                goals: get(goals_idx),
                green_cards: get(green_idx),
                yellow_cards: get(yellow_idx),
                red_cards: get(red_idx),
            });
        }
    }

    (players, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> ExtractContext {
        ExtractContext::new(Url::parse("https://www.hockeyvictoria.org.au/game/2048530").unwrap())
    }

    #[test]
    fn extracts_per_game_stats() {
        let html = r#"
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

        let (players, warnings) = extract_participation(html, &ctx());
        assert!(warnings.0.is_empty());
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].player_hv_id, "900001");
        assert_eq!(players[0].goals, 2);
        assert_eq!(players[0].green_cards, 1);
    }
}
