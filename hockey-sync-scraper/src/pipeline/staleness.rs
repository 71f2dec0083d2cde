//! Staleness selector.
//!
//! Pure functions over already-fetched document lists; this module never
//! talks to the store or the network, it only narrows a work set. Stage
//! workers call a `Store::list_*` method and hand the result here before
//! deciding what to fetch.

use chrono::{DateTime, Duration, Utc};

use crate::model::{Game, Grade};

/// Default re-check interval for Grades considered for the Teams stage.
pub const DEFAULT_GRADE_STALENESS: Duration = Duration::weeks(1);

/// Default results look-back window, in days.
pub const DEFAULT_RESULTS_DAYS_BACK: i64 = 7;

/// Grades whose `last_checked` is absent or older than `threshold`.
pub fn stale_grades(grades: &[Grade], now: DateTime<Utc>, threshold: Duration) -> Vec<Grade> {
    grades
        .iter()
        .filter(|g| match g.last_checked {
        None => true,
        Some(checked) => now - checked > threshold,
    })
        .cloned()
        .collect()
}

/// Games in scope for a Results run: `mentone_playing`, scheduled within the
/// past `days_back` days, and not already in a terminal state unless
/// `force_update` is set.
pub fn games_needing_results(games: &[Game], now: DateTime<Utc>, days_back: i64, force_update: bool) -> Vec<Game> {
    let cutoff = now - Duration::days(days_back);
    games
        .iter()
        .filter(|g| g.mentone_playing)
        .filter(|g| matches!(g.scheduled_at, Some(at) if at <= now && at >= cutoff))
        .filter(|g| force_update || !g.status.is_terminal())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GameStatus, TeamRef};

    fn grade(last_checked: Option<DateTime<Utc>>) -> Grade {
        Grade {
            id: "37393".to_string(),
            name: "Men's Pennant B".to_string(),
            parent_comp_id: "22076".to_string(),
            fixture_id: "37393".to_string(),
            comp_url: String::new(),
            grade_type: crate::model::TeamType::Senior,
            gender: crate::model::Gender::Men,
            season: "2025".to_string(),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_checked,
        }
    }

    #[test]
    fn grade_with_no_last_checked_is_stale() {
        let now = Utc::now();
        let grades = vec![grade(None)];
        assert_eq!(stale_grades(&grades, now, DEFAULT_GRADE_STALENESS).len(), 1);
    }

    #[test]
    fn fresh_grade_is_not_stale() {
        let now = Utc::now();
        let grades = vec![grade(Some(now - Duration::hours(1)))];
        assert!(stale_grades(&grades, now, DEFAULT_GRADE_STALENESS).is_empty());
    }

    fn game(mentone_playing: bool, scheduled_at: Option<DateTime<Utc>>, status: GameStatus) -> Game {
        Game {
            id: "2048530".to_string(),
            comp_id: "22076".to_string(),
            grade_id: "37393".to_string(),
            round: 4,
            scheduled_at,
            venue_name: None,
            venue_code: None,
            home_team: TeamRef::default(),
            away_team: TeamRef::default(),
            status,
            winner_text: None,
            mentone_result: None,
            mentone_playing,
            participation: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            results_retrieved_at: None,
            last_checked: None,
        }
    }

    #[test]
    fn selects_past_non_terminal_mentone_games_within_window() {
        let now = Utc::now();
        let games = vec![
            game(true, Some(now - Duration::days(1)), GameStatus::Scheduled),
            game(false, Some(now - Duration::days(1)), GameStatus::Scheduled),
            game(true, Some(now - Duration::days(30)), GameStatus::Scheduled),
            game(true, Some(now - Duration::days(1)), GameStatus::Completed),
            game(true, Some(now + Duration::days(1)), GameStatus::Scheduled),
        ];

        let selected = games_needing_results(&games, now, DEFAULT_RESULTS_DAYS_BACK, false);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn force_update_includes_terminal_games() {
        let now = Utc::now();
        let games = vec![game(true, Some(now - Duration::days(1)), GameStatus::Completed)];
        assert!(games_needing_results(&games, now, DEFAULT_RESULTS_DAYS_BACK, false).is_empty());
        assert_eq!(games_needing_results(&games, now, DEFAULT_RESULTS_DAYS_BACK, true).len(), 1);
    }
}
