//! Stage-specific HTML extractors. Each extractor is a pure
//! function of the page bytes plus a small [`ExtractContext`]; none touches
//! the store or the network.

mod competitions;
mod draw;
mod game_detail;
mod ladder;
mod participation;
mod team_stats;
mod venue;

pub use competitions::{extract_competitions_index, CompetitionBlock, GradeLink};
pub use draw::{extract_round, GameCard};
pub use game_detail::{extract_game_detail, GameDetail};
pub use ladder::{extract_ladder, LadderRow};
pub use participation::{extract_participation, ParticipatingPlayer};
pub use team_stats::{extract_team_stats, RosterEntry, TeamStatsPage};
pub use venue::{extract_venue, VenueInfo};

use crate::error::ParseWarning;
use url::Url;

/// Context shared by every extractor. Intentionally small: extractors never
/// reach outside the page they were given.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    /// Base URL used to resolve relative `href`s found on the page.
    pub base_url: Url,
}

impl ExtractContext {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn resolve(&self, href: &str) -> Option<Url> {
        self.base_url.join(href).ok()
    }
}

/// Accumulates non-fatal parse warnings produced while walking a page, so a
/// malformed record is skipped without aborting the rest of the page.
#[derive(Debug, Default)]
pub struct Warnings(pub Vec<ParseWarning>);

impl Warnings {
    pub fn push(&mut self, extractor: &'static str, fragment: impl Into<String>, reason: impl Into<String>) {
        self.0.push(ParseWarning {
            extractor,
            fragment: fragment.into(),
            reason: reason.into(),
        });
    }
}
