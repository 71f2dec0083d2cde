//! The entity model. Every entity carries `created_at`,
//! `updated_at`, and (except `Club`) `last_checked`, all absolute UTC
//! instants. Document keys equal the external id everywhere, mirrored as a
//! string in the `id` field even when the external id is numeric.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classifier output: the competition/grade "kind".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamType {
    Senior,
    Junior,
    Midweek,
    Masters,
    Indoor,
    Outdoor,
    #[serde(rename = "social_other")]
    SocialOther,
}

/// Classifier output: gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Men,
    Women,
    Mixed,
    Unknown,
}

/// Terminal and re-checkable game outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    Completed,
    Forfeit,
    Cancelled,
    Postponed,
    Abandoned,
    WashedOut,
    UnknownOutcome,
}

impl GameStatus {
    /// Terminal states are not re-checked by the Results stage unless
    /// `force_update` is set.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GameStatus::Completed
            | GameStatus::Forfeit
            | GameStatus::Cancelled
            | GameStatus::Abandoned
            | GameStatus::WashedOut
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentoneResult {
    Win,
    Loss,
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    pub id: String,
    pub name: String,
    pub season: String,
    #[serde(default)]
    pub comp_type: Option<TeamType>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub id: String,
    pub name: String,
    pub parent_comp_id: String,
    pub fixture_id: String,
    pub comp_url: String,
    pub grade_type: TeamType,
    pub gender: Gender,
    pub season: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LadderSnapshot {
    pub position: u32,
    pub points: i32,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub byes: u32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub goal_diff: i32,
    pub snapshot_at: Option<DateTime<Utc>>,
}

impl LadderSnapshot {
    /// Invariant: played = wins + draws + losses + byes.
    pub fn is_consistent(&self) -> bool {
        self.played == self.wins + self.draws + self.losses + self.byes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub display_name: String,
    pub club_key: String,
    pub club_name: String,
    pub comp_id: String,
    pub grade_id: String,
    pub is_home_club: bool,
    pub team_type: TeamType,
    pub gender: Gender,
    pub season: String,
    #[serde(default)]
    pub ladder: LadderSnapshot,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Reserved slug for the focus club so it never collides with a slugified
/// competitor club name.
pub const FOCUS_CLUB_SLUG: &str = "mentone";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Club {
    pub id: String,
    pub display_name: String,
    pub short_name: String,
    #[serde(default)]
    pub primary_colour: Option<String>,
    #[serde(default)]
    pub secondary_colour: Option<String>,
    #[serde(default)]
    pub home_venue_hint: Option<String>,
    pub is_focus_club: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TeamRef {
    pub team_id: String,
    pub name: String,
    #[serde(default)]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub comp_id: String,
    pub grade_id: String,
    pub round: u32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub venue_code: Option<String>,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    pub status: GameStatus,
    #[serde(default)]
    pub winner_text: Option<String>,
    #[serde(default)]
    pub mentone_result: Option<MentoneResult>,
    pub mentone_playing: bool,
    #[serde(default)]
    pub participation: Vec<GameParticipant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub results_retrieved_at: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameParticipant {
    pub player_id: String,
    pub name: String,
    pub goals: u32,
    pub green_cards: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRole {
    Field,
    Goalkeeper,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerStats {
    pub games_played: u32,
    pub goals: u32,
    pub green_cards: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTeamRef {
    pub team_id: String,
    pub team_name: String,
    pub grade_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub display_name: String,
    pub role: PlayerRole,
    pub gender: Gender,
    pub teams: Vec<PlayerTeamRef>,
    pub stats: PlayerStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub field_code: Option<String>,
    pub map_url: Option<String>,
    pub source_game_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The read-through ladder cache document. Populated as a side effect of the Ladder stage so the
/// out-of-scope ladder-position cache service has something to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderCacheEntry {
    pub team_id: String,
    pub grade_id: String,
    pub ladder: LadderSnapshot,
    pub cached_at: DateTime<Utc>,
}
