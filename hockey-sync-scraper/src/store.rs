//! Document store.
//!
//! The whole dataset lives in memory behind a lock and is periodically (or
//! on-demand) flushed to disk as JSON, rather than talking to a real
//! document database per write. Every entity kind gets its own typed
//! collection (explicit records, not runtime-typed dicts) and a genuine
//! merge-upsert contract: each `upsert_*` fetches-or-defaults the document
//! and hands it to a caller-supplied closure that may only touch the
//! fields its stage owns, leaving every other field exactly as it was.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::error::StoreError;
use crate::model::{Club, Competition, Game, Grade, LadderCacheEntry, Player, Team, Venue};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    competitions: HashMap<String, Competition>,
    #[serde(default)]
    grades: HashMap<String, Grade>,
    #[serde(default)]
    teams: HashMap<String, Team>,
    #[serde(default)]
    clubs: HashMap<String, Club>,
    #[serde(default)]
    games: HashMap<String, Game>,
    #[serde(default)]
    players: HashMap<String, Player>,
    #[serde(default)]
    venues: HashMap<String, Venue>,
    #[serde(default)]
    ladder_cache: HashMap<String, LadderCacheEntry>,
}

/// The document store. Cheap to `Clone` (shares the underlying lock via
/// `Arc`), so it can be handed to every stage worker and the HTTP server
/// alike.
#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<Collections>>,
    persist_path: Option<PathBuf>,
}

impl Store {
    /// An ephemeral store with nothing persisted; useful for tests and
    /// dry-run previews.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Collections::default())),
            persist_path: None,
        }
    }

    /// Loads (or initializes) a store backed by a single JSON file at
    /// `path`, reading it whole into memory up front.
    pub async fn open_file(path: PathBuf) -> Self {
        let collections = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                error!("failed to parse store file {path:?}, starting empty: {e}");
                Collections::default()
            }),
            Err(e) => {
                warn!("no existing store file at {path:?} ({e}), starting empty");
                Collections::default()
            }
        };

        Self {
            inner: Arc::new(RwLock::new(collections)),
            persist_path: Some(path),
        }
    }

    /// Flushes the entire in-memory dataset to disk. A no-op for
    /// [`Store::in_memory`] stores. This is the unit of work a
    /// [`BatchWriter`] commits.
    pub async fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let snapshot = self.inner.read().await;
        let data = serde_json::to_string_pretty(&*snapshot)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    // -- Competitions --------------------------------------------------

    pub async fn upsert_competition(&self, id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut Competition)) -> Competition {
        let mut guard = self.inner.write().await;
        let entry = guard.competitions.entry(id.to_string()).or_insert_with(|| Competition {
            id: id.to_string(),
            name: String::new(),
            season: String::new(),
            comp_type: None,
            active: false,
            created_at: now,
            updated_at: now,
            last_checked: None,
        });
        f(entry);
        entry.updated_at = now;
        entry.clone()
    }

    pub async fn get_competition(&self, id: &str) -> Option<Competition> {
        self.inner.read().await.competitions.get(id).cloned()
    }

    pub async fn list_competitions(&self) -> Vec<Competition> {
        self.inner.read().await.competitions.values().cloned().collect()
    }

    // -- Grades ----------------------------------------------------------

    pub async fn upsert_grade(&self, id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut Grade)) -> Grade {
        let mut guard = self.inner.write().await;
        let entry = guard.grades.entry(id.to_string()).or_insert_with(|| Grade {
            id: id.to_string(),
            name: String::new(),
            parent_comp_id: String::new(),
            fixture_id: String::new(),
            comp_url: String::new(),
            grade_type: crate::model::TeamType::Senior,
            gender: crate::model::Gender::Unknown,
            season: String::new(),
            active: false,
            created_at: now,
            updated_at: now,
            last_checked: None,
        });
        f(entry);
        entry.updated_at = now;
        entry.clone()
    }

    pub async fn get_grade(&self, id: &str) -> Option<Grade> {
        self.inner.read().await.grades.get(id).cloned()
    }

    pub async fn list_grades(&self) -> Vec<Grade> {
        self.inner.read().await.grades.values().cloned().collect()
    }

    // -- Clubs -------------------------------------------------------------

    pub async fn upsert_club(&self, id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut Club)) -> Club {
        let mut guard = self.inner.write().await;
        let entry = guard.clubs.entry(id.to_string()).or_insert_with(|| Club {
            id: id.to_string(),
            display_name: String::new(),
            short_name: String::new(),
            primary_colour: None,
            secondary_colour: None,
            home_venue_hint: None,
            is_focus_club: false,
            created_at: now,
            updated_at: now,
        });
        f(entry);
        entry.updated_at = now;
        entry.clone()
    }

    // -- Teams ---------------------------------------------------------

    pub async fn upsert_team(&self, id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut Team)) -> Team {
        let mut guard = self.inner.write().await;
        let entry = guard.teams.entry(id.to_string()).or_insert_with(|| Team {
            id: id.to_string(),
            display_name: String::new(),
            club_key: String::new(),
            club_name: String::new(),
            comp_id: String::new(),
            grade_id: String::new(),
            is_home_club: false,
            team_type: crate::model::TeamType::Senior,
            gender: crate::model::Gender::Unknown,
            season: String::new(),
            ladder: Default::default(),
            active: false,
            created_at: now,
            updated_at: now,
            last_checked: None,
        });
        f(entry);
        entry.updated_at = now;
        entry.clone()
    }

    pub async fn get_team(&self, id: &str) -> Option<Team> {
        self.inner.read().await.teams.get(id).cloned()
    }

    pub async fn list_teams(&self) -> Vec<Team> {
        self.inner.read().await.teams.values().cloned().collect()
    }

    pub async fn list_teams_for_grade(&self, grade_id: &str) -> Vec<Team> {
        self.inner
            .read()
            .await
            .teams
            .values()
            .filter(|t| t.grade_id == grade_id)
            .cloned()
            .collect()
    }

    pub async fn list_focus_club_teams(&self) -> Vec<Team> {
        self.inner
            .read()
            .await
            .teams
            .values()
            .filter(|t| t.is_home_club && t.active)
            .cloned()
            .collect()
    }

    // -- Games -----------------------------------------------------------

    pub async fn upsert_game(&self, id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut Game)) -> Game {
        let mut guard = self.inner.write().await;
        let entry = guard.games.entry(id.to_string()).or_insert_with(|| Game {
            id: id.to_string(),
            comp_id: String::new(),
            grade_id: String::new(),
            round: 0,
            scheduled_at: None,
            venue_name: None,
            venue_code: None,
            home_team: Default::default(),
            away_team: Default::default(),
            status: crate::model::GameStatus::Scheduled,
            winner_text: None,
            mentone_result: None,
            mentone_playing: false,
            participation: vec![],
            created_at: now,
            updated_at: now,
            results_retrieved_at: None,
            last_checked: None,
        });
        f(entry);
        entry.updated_at = now;
        entry.clone()
    }

    pub async fn get_game(&self, id: &str) -> Option<Game> {
        self.inner.read().await.games.get(id).cloned()
    }

    pub async fn list_games(&self) -> Vec<Game> {
        self.inner.read().await.games.values().cloned().collect()
    }

    // -- Players -----------------------------------------------------------

    pub async fn upsert_player(&self, id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut Player)) -> Player {
        let mut guard = self.inner.write().await;
        let entry = guard.players.entry(id.to_string()).or_insert_with(|| Player {
            id: id.to_string(),
            display_name: String::new(),
            role: crate::model::PlayerRole::Field,
            gender: crate::model::Gender::Unknown,
            teams: vec![],
            stats: Default::default(),
            created_at: now,
            updated_at: now,
            last_checked: None,
        });
        f(entry);
        entry.updated_at = now;
        entry.clone()
    }

    pub async fn list_players(&self) -> Vec<Player> {
        self.inner.read().await.players.values().cloned().collect()
    }

    // -- Venues ------------------------------------------------------------

    pub async fn upsert_venue(&self, id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut Venue)) -> Venue {
        let mut guard = self.inner.write().await;
        let entry = guard.venues.entry(id.to_string()).or_insert_with(|| Venue {
            id: id.to_string(),
            name: String::new(),
            address: None,
            field_code: None,
            map_url: None,
            source_game_urls: vec![],
            created_at: now,
            updated_at: now,
        });
        f(entry);
        entry.updated_at = now;
        entry.clone()
    }

    pub async fn list_venues(&self) -> Vec<Venue> {
        self.inner.read().await.venues.values().cloned().collect()
    }

    // -- Ladder cache (auxiliary, read-through collection) ------------------

    pub async fn put_ladder_cache(&self, entry: LadderCacheEntry) {
        let mut guard = self.inner.write().await;
        guard.ladder_cache.insert(entry.team_id.clone(), entry);
    }

    pub async fn get_ladder_cache(&self, team_id: &str) -> Option<LadderCacheEntry> {
        self.inner.read().await.ladder_cache.get(team_id).cloned()
    }

    /// Stats used for operational reporting (HTTP `/status` surface, not
    /// an entity collection in its own right).
    pub async fn counts(&self) -> StoreCounts {
        let guard = self.inner.read().await;
        StoreCounts {
            competitions: guard.competitions.len(),
            grades: guard.grades.len(),
            teams: guard.teams.len(),
            clubs: guard.clubs.len(),
            games: guard.games.len(),
            players: guard.players.len(),
            venues: guard.venues.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreCounts {
    pub competitions: usize,
    pub grades: usize,
    pub teams: usize,
    pub clubs: usize,
    pub games: usize,
    pub players: usize,
    pub venues: usize,
}

/// Batches writes within a stage so persistence happens in bounded chunks
/// rather than once per document; batch commits are sequential"). A [`StoreError`]
/// on flush abandons the current batch; the caller increments its error
/// counter and continues with the next batch.
pub struct BatchWriter {
    store: Store,
    batch_size: usize,
    pending: usize,
}

impl BatchWriter {
    pub fn new(store: Store, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.min(400),
            pending: 0,
        }
    }

    /// Call once per write already applied to the store's in-memory state.
    /// Flushes to the persistence backend once `batch_size` writes have
    /// accumulated.
    pub async fn record_write(&mut self) -> Result<(), StoreError> {
        self.pending += 1;
        if self.pending >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending == 0 {
            return Ok(());
        }
        self.store.save().await?;
        self.pending = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TeamType;

    #[tokio::test]
    async fn upsert_preserves_fields_outside_the_closure() {
        let store = Store::in_memory();
        let now = Utc::now();

        store
            .upsert_team("337089", now, |t| {
            t.display_name = "Mentone Men's 1".to_string();
            t.club_name = "Mentone".to_string();
            t.team_type = TeamType::Senior;
            t.active = true;
        })
            .await;

        // a later Ladder-stage-only write must not clobber the fields set above.
        store
            .upsert_team("337089", now, |t| {
            t.ladder.position = 1;
            t.ladder.points = 25;
        })
            .await;

        let team = store.get_team("337089").await.unwrap();
        assert_eq!(team.display_name, "Mentone Men's 1");
        assert_eq!(team.club_name, "Mentone");
        assert!(team.active);
        assert_eq!(team.ladder.position, 1);
        assert_eq!(team.ladder.points, 25);
    }

    #[tokio::test]
    async fn results_stage_write_does_not_touch_venue_or_teams() {
        let store = Store::in_memory();
        let now = Utc::now();

        store
            .upsert_game("2048530", now, |g| {
            g.venue_name = Some("Mentone Grammar".to_string());
            g.home_team.name = "Mentone".to_string();
            g.away_team.name = "Camberwell".to_string();
            g.round = 4;
        })
            .await;

        store
            .upsert_game("2048530", now, |g| {
            g.status = crate::model::GameStatus::Completed;
            g.home_team.score = Some(3);
            g.away_team.score = Some(2);
            g.results_retrieved_at = Some(now);
        })
            .await;

        let game = store.get_game("2048530").await.unwrap();
        assert_eq!(game.venue_name.as_deref(), Some("Mentone Grammar"));
        assert_eq!(game.home_team.name, "Mentone");
        assert_eq!(game.round, 4);
        assert_eq!(game.status, crate::model::GameStatus::Completed);
        assert_eq!(game.home_team.score, Some(3));
    }

    #[tokio::test]
    async fn batch_writer_flushes_at_cap() {
        let store = Store::in_memory();
        let mut writer = BatchWriter::new(store, 2);
        writer.record_write().await.unwrap();
        assert_eq!(writer.pending, 1);
        writer.record_write().await.unwrap();
        assert_eq!(writer.pending, 0);
    }
}
