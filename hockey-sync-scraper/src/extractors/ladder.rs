//! Ladder / pointscore extractor.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::instrument;

use super::{ExtractContext, Warnings};
use crate::scraper_util::{elem_text, extract_int, path_digit_segments};

static TEAM_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/games/team/(\d+)/(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderRow {
    pub position: u32,
    pub team_name: String,
    pub team_hv_id: Option<String>,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub byes: u32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub goal_diff: i32,
    pub points: i32,
}

/// Parses a pointscore page into an ordered list of team rows. Tie-breaks
/// follow source ordering; negative goal differences may use either `-` or
/// `−` (handled by [`crate::scraper_util::extract_int`]).
#[instrument(skip(html))]
pub fn extract_ladder(html: &str, _ctx: &ExtractContext) -> (Vec<LadderRow>, Warnings) {
    let doc = Html::parse_document(html);
    let table_selector = Selector::parse("table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    let link_selector = Selector::parse("a").unwrap();

    let mut rows = vec![];
    let mut warnings = Warnings::default();

    for table in doc.select(&table_selector) {
        for (idx, tr) in table.select(&row_selector).enumerate() {
            let cells: Vec<_> = tr.select(&cell_selector).collect();
            if cells.len() < 10 {
                // header row or unrelated table
                continue;
            }

            let parse_row = || -> Result<LadderRow, String> {
                let team_cell = cells[0];
                let team_text = elem_text(team_cell);
                // "1. Mentone" -> position 1, name "Mentone"
                let (position_str, name) = team_text
                    .split_once('.')
                    .ok_or_else(|| format!("team cell missing position prefix: {team_text}"))?;
                let position: u32 = position_str
                    .trim()
                    .parse()
                    .map_err(|_| format!("bad position in {team_text}"))?;
                let team_name = name.trim().to_string();

                let team_href = team_cell.select(&link_selector).next().and_then(|a| a.value().attr("href"));
                let team_hv_id = team_href.and_then(|href| {
                    TEAM_LINK_RE
                        .captures(href)
                        .map(|caps| caps[2].to_string())
                        .or_else(|| path_digit_segments(href).last().map(|s| s.to_string()))
                });

                let nums: Vec<i64> = cells[1..10]
                    .iter()
                    .map(|c| extract_int(&elem_text(*c)).unwrap_or(0))
                    .collect();

                Ok(LadderRow {
                    position,
                    team_name,
                    team_hv_id,
                    played: nums[0] as u32,
                    wins: nums[1] as u32,
                    draws: nums[2] as u32,
                    losses: nums[3] as u32,
                    byes: nums[4] as u32,
                    goals_for: nums[5] as i32,
                    goals_against: nums[6] as i32,
                    goal_diff: nums[7] as i32,
                    points: nums[8] as i32,
                })
            };

            match parse_row() {
                Ok(row) => rows.push(row),
                Err(reason) => warnings.push("ladder", format!("row {idx}"), reason),
            }
        }
    }

    (rows, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> ExtractContext {
        ExtractContext::new(Url::parse("https://www.hockeyvictoria.org.au/pointscore/22076/37393").unwrap())
    }

    #[test]
    fn parses_a_ladder_row() {
        let html = r#"
  <html><body><table>
  <tr><th>Team</th><th>P</th><th>W</th><th>D</th><th>L</th><th>B</th><th>GF</th><th>GA</th><th>GD</th><th>Pts</th></tr>
  <tr>
  <td><a href="/games/team/22076/337089">1. Mentone</a></td>
  <td>10</td><td>8</td><td>1</td><td>1</td><td>0</td>
  <td>32</td><td>11</td><td>21</td><td>25</td>
  </tr>
  </table></body></html>
  "#;

        let (rows, warnings) = extract_ladder(html, &ctx());
        assert!(warnings.0.is_empty());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.position, 1);
        assert_eq!(row.team_name, "Mentone");
        assert_eq!(row.team_hv_id.as_deref(), Some("337089"));
        assert_eq!(row.played, 10);
        assert_eq!(row.wins, 8);
        assert_eq!(row.draws, 1);
        assert_eq!(row.losses, 1);
        assert_eq!(row.byes, 0);
        assert_eq!(row.goals_for, 32);
        assert_eq!(row.goals_against, 11);
        assert_eq!(row.goal_diff, 21);
        assert_eq!(row.points, 25);
    }

    #[test]
    fn accepts_unicode_minus_sign_in_goal_diff() {
        let html = r#"
  <html><body><table>
  <tr>
  <td>3. Some Team</td>
  <td>10</td><td>2</td><td>1</td><td>7</td><td>0</td>
  <td>8</td><td>25</td><td>\u{2212}17</td><td>7</td>
  </tr>
  </table></body></html>
  "#;
        let html = html.replace("\\u{2212}", "\u{2212}");
        let (rows, _warnings) = extract_ladder(&html, &ctx());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].goal_diff, -17);
    }
}
