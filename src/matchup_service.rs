//! Matchup orchestration: volatile cache, durable snapshots and live overlays.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::calendar::{as_of_for_slate, season_bounds, season_label_for_date, today_et};
use crate::data_service::SlateDataSource;
use crate::error::{ServiceError, StoreError};
use crate::models::{
    GameLinesResponse, InjuryRecord, InjuryStatus, MatchupResponse, MatchupTier, MetaResponse, PlayerCard,
    PlayerCardWindow, PlayerMatchup, RefreshResponse, Stat, Window, DEFAULT_RANK,
};
use crate::providers::{InjurySource, LinesSource};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// Environment score used when the opponent has none.
pub const DEFAULT_ENVIRONMENT_SCORE: f64 = 50.0;

fn matchups_key(slate_date: NaiveDate, window: Window) -> String {
    format!("matchups:{slate_date}:{window}")
}

fn snapshot_key(season: &str, as_of: NaiveDate, slate_teams: &BTreeSet<String>) -> String {
    let teams = if slate_teams.is_empty() {
        "none".to_string()
    } else {
        slate_teams.iter().cloned().collect::<Vec<_>>().join(",")
    };
    format!("snapshot:{season}:{as_of}:{teams}")
}

fn game_lines_key(slate_date: NaiveDate) -> String {
    format!("game-lines:{slate_date}")
}

/// Replaces every player's injury status with the live report: first by
/// (team, name), then by name alone.
pub fn with_injury_overlay(base: &MatchupResponse, injuries: Vec<InjuryRecord>) -> MatchupResponse {
    let mut by_team_name: HashMap<(String, String), InjuryStatus> = HashMap::new();
    let mut by_name: HashMap<String, InjuryStatus> = HashMap::new();
    for injury in &injuries {
        let name = injury.player_name.to_uppercase();
        by_team_name.insert((injury.team.to_uppercase(), name.clone()), injury.status);
        by_name.insert(name, injury.status);
    }

    let players = base
        .players
        .iter()
        .map(|player| {
            let name = player.player_name.to_uppercase();
            let status = by_team_name
                .get(&(player.team.to_uppercase(), name.clone()))
                .or_else(|| by_name.get(&name))
                .copied();
            PlayerMatchup {
                injury_status: status,
                ..player.clone()
            }
        })
        .collect();

    MatchupResponse {
        injuries,
        players,
        ..base.clone()
    }
}

/// Ascending best rank, then descending environment score, then name.
pub fn sort_players(players: &mut [PlayerMatchup]) {
    players.sort_by(|a, b| {
        a.best_rank()
            .cmp(&b.best_rank())
            .then_with(|| b.environment_score.total_cmp(&a.environment_score))
            .then_with(|| a.player_name.cmp(&b.player_name))
    });
}

/// Volatile caches the orchestrator reads through.
#[derive(Clone)]
pub struct MatchupCaches {
    pub matchups: Arc<dyn Cache<MatchupResponse>>,
    pub snapshots: Arc<dyn Cache<Arc<Snapshot>>>,
    pub game_lines: Arc<dyn Cache<GameLinesResponse>>,
}

pub struct MatchupService {
    data: Arc<dyn SlateDataSource>,
    injuries: Arc<dyn InjurySource>,
    lines: Arc<dyn LinesSource>,
    store: Arc<dyn SnapshotStore>,
    caches: MatchupCaches,
}

impl MatchupService {
    pub fn new(
        data: Arc<dyn SlateDataSource>,
        injuries: Arc<dyn InjurySource>,
        lines: Arc<dyn LinesSource>,
        store: Arc<dyn SnapshotStore>,
        caches: MatchupCaches,
    ) -> Self {
        MatchupService {
            data,
            injuries,
            lines,
            store,
            caches,
        }
    }

    /// Cache, then durable store, then a fresh computation. Live injuries are
    /// overlaid on whatever base response was found.
    pub async fn get_matchups(&self, slate_date: NaiveDate, window: Window) -> MatchupResponse {
        let key = matchups_key(slate_date, window);
        let expected_as_of = as_of_for_slate(slate_date);

        let mut base = self.caches.matchups.get(&key);
        if base.is_none() {
            base = match self.store.get(slate_date, window).await {
                Ok(stored) => stored,
                Err(err) => {
                    warn!("Snapshot read failed for {} window={}: {}", slate_date, window, err);
                    None
                }
            };
            if let Some(stored) = &base {
                self.caches.matchups.set(&key, stored.clone());
            }
        }
        if let Some(stale_as_of) = base
            .as_ref()
            .map(|found| found.as_of_date)
            .filter(|as_of| *as_of < expected_as_of)
        {
            info!(
                "Ignoring stale snapshot for {} window={} (as_of={} expected>={})",
                slate_date, window, stale_as_of, expected_as_of
            );
            base = None;
        }

        let base = match base {
            Some(base) => base,
            None => {
                let computed = self.compute_matchups(slate_date, window).await;
                if let Err(err) = self.store.upsert(&computed).await {
                    warn!("Failed to persist snapshot for {} window={}: {}", slate_date, window, err);
                }
                self.caches.matchups.set(&key, computed.clone());
                computed
            }
        };

        let live = match self.injuries.fetch_injuries(slate_date).await {
            Ok(live) => live,
            Err(err) => {
                warn!("Live injury overlay failed for {}: {}", slate_date, err);
                base.injuries.clone()
            }
        };
        with_injury_overlay(&base, live)
    }

    async fn snapshot_for(&self, season: &str, as_of: NaiveDate, slate_teams: &BTreeSet<String>) -> Arc<Snapshot> {
        let key = snapshot_key(season, as_of, slate_teams);
        if let Some(snapshot) = self.caches.snapshots.get(&key) {
            return snapshot;
        }

        let started = Instant::now();
        let snapshot = match self.data.build_snapshot(season, as_of, slate_teams).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                warn!("Snapshot build failed for season={} as_of={}: {}", season, as_of, err);
                Arc::new(Snapshot::empty())
            }
        };
        self.caches.snapshots.set(&key, snapshot.clone());
        info!(
            "Snapshot built for {} {} in {:?} (teams={})",
            season,
            as_of,
            started.elapsed(),
            slate_teams.len()
        );
        snapshot
    }

    async fn compute_matchups(&self, slate_date: NaiveDate, window: Window) -> MatchupResponse {
        let started = Instant::now();
        let games = self.data.fetch_slate_games(slate_date).await;
        let injuries = match self.injuries.fetch_injuries(slate_date).await {
            Ok(injuries) => injuries,
            Err(err) => {
                warn!("Injury fetch failed for {}: {}", slate_date, err);
                Vec::new()
            }
        };

        let mut opponents: HashMap<&str, &str> = HashMap::new();
        let mut slate_teams = BTreeSet::new();
        for game in &games {
            opponents.insert(&game.away_team, &game.home_team);
            opponents.insert(&game.home_team, &game.away_team);
            slate_teams.insert(game.away_team.clone());
            slate_teams.insert(game.home_team.clone());
        }

        let as_of = as_of_for_slate(slate_date);
        let season = season_label_for_date(slate_date);
        let snapshot = self.snapshot_for(&season, as_of, &slate_teams).await;
        let tables = snapshot.window(window);

        let injury_lookup: HashMap<(String, String), InjuryStatus> = injuries
            .iter()
            .map(|i| ((i.team.to_uppercase(), i.player_name.to_uppercase()), i.status))
            .collect();

        let mut players: Vec<PlayerMatchup> = snapshot
            .rotation_pool
            .iter()
            .filter(|entry| slate_teams.contains(&entry.team))
            .filter_map(|entry| {
                let opponent = *opponents.get(entry.team.as_str())?;
                let mut stat_ranks = BTreeMap::new();
                let mut stat_tiers = BTreeMap::new();
                for stat in Stat::ALL {
                    let rank = tables
                        .ranks
                        .rank(opponent, entry.position_group, stat)
                        .unwrap_or(DEFAULT_RANK);
                    stat_ranks.insert(stat.display().to_string(), rank);
                    stat_tiers.insert(stat.display().to_string(), MatchupTier::from_rank(rank));
                }
                Some(PlayerMatchup {
                    player_id: entry.player_id,
                    player_name: entry.player_name.clone(),
                    team: entry.team.clone(),
                    opponent: opponent.to_string(),
                    position_group: entry.position_group,
                    avg_minutes: entry.avg_minutes,
                    injury_status: injury_lookup
                        .get(&(entry.team.to_uppercase(), entry.player_name.to_uppercase()))
                        .copied(),
                    environment_score: tables
                        .environment
                        .get(opponent)
                        .copied()
                        .unwrap_or(DEFAULT_ENVIRONMENT_SCORE),
                    stat_ranks,
                    stat_tiers,
                })
            })
            .collect();
        sort_players(&mut players);

        if !snapshot.player_cards.is_empty() {
            if let Err(err) = self.store.upsert_player_cards(&snapshot.player_cards).await {
                warn!("Failed upserting player cards for {}: {}", slate_date, err);
            }
        }

        info!(
            "Computed matchups for {} window={} in {:?} (games={} players={})",
            slate_date,
            window,
            started.elapsed(),
            games.len(),
            players.len()
        );

        MatchupResponse {
            slate_date,
            as_of_date: as_of,
            window,
            games,
            injuries,
            players,
        }
    }

    /// Stored response for the slate, with read failures treated as a miss.
    async fn stored_or_none(&self, slate_date: NaiveDate, window: Window) -> Option<MatchupResponse> {
        self.store.get(slate_date, window).await.unwrap_or_else(|err| {
            warn!("Snapshot read failed for {} window={}: {}", slate_date, window, err);
            None
        })
    }

    /// Drops cached entries for the slate. With `recompute` both windows are
    /// rebuilt and stored; without it the stored rows are deleted as well.
    pub async fn refresh(&self, slate_date: NaiveDate, recompute: bool) -> Result<RefreshResponse, ServiceError> {
        let existing_season = self.stored_or_none(slate_date, Window::Season).await;
        let existing_last10 = self.stored_or_none(slate_date, Window::Last10).await;

        let as_of = as_of_for_slate(slate_date);
        let season = season_label_for_date(slate_date);
        let mut cleared = self
            .caches
            .matchups
            .invalidate_prefix(&format!("matchups:{slate_date}:")) as u64;
        cleared += self
            .caches
            .snapshots
            .invalidate_prefix(&format!("snapshot:{season}:{as_of}")) as u64;

        if recompute {
            for (window, existing) in [(Window::Season, existing_season), (Window::Last10, existing_last10)] {
                let mut response = self.compute_matchups(slate_date, window).await;
                if let Some(existing) = existing {
                    if response.games.is_empty() && !existing.games.is_empty() {
                        warn!(
                            "Recompute produced empty {} slate for {}; preserving existing snapshot",
                            window, slate_date
                        );
                        response = existing;
                    }
                }
                if let Err(err) = self.store.upsert(&response).await {
                    warn!("Failed to persist recomputed {} slate for {}: {}", window, slate_date, err);
                }
                self.caches.matchups.set(&matchups_key(slate_date, window), response);
            }
        } else {
            cleared += self.store.delete_slate(slate_date).await?;
        }

        Ok(RefreshResponse {
            slate_date,
            cleared_keys: cleared,
            recomputed: recompute,
        })
    }

    pub fn get_meta(&self) -> MetaResponse {
        let today = today_et();
        let (season_start, season_end) = season_bounds(today);
        MetaResponse {
            season_label: season_label_for_date(today),
            current_date_et: today,
            season_start,
            season_end,
        }
    }

    fn read_card(result: Result<Option<PlayerCard>, StoreError>, player_id: i64) -> Option<PlayerCard> {
        result.unwrap_or_else(|err| {
            warn!("Player card read failed for player_id={}: {}", player_id, err);
            None
        })
    }

    async fn lookup_card(
        &self,
        player_id: i64,
        slate_date: Option<NaiveDate>,
        window: PlayerCardWindow,
    ) -> Option<PlayerCard> {
        let result = match slate_date {
            Some(date) => self.store.get_player_card_as_of(player_id, date, window).await,
            None => self.store.get_latest_player_card(player_id, window).await,
        };
        Self::read_card(result, player_id)
    }

    /// Stored card for the window, backfilling recent windows from the season
    /// card and, failing that, building the slate's cards from scratch.
    pub async fn get_player_card(
        &self,
        player_id: i64,
        slate_date: Option<NaiveDate>,
        window: PlayerCardWindow,
    ) -> Option<PlayerCard> {
        let as_of = slate_date.unwrap_or_else(today_et);
        if window == PlayerCardWindow::Season {
            if let Some(card) = self.lookup_card(player_id, slate_date, window).await {
                return Some(card);
            }
        }

        let season_card = Self::read_card(
            self.store
                .get_player_card_as_of(player_id, as_of, PlayerCardWindow::Season)
                .await,
            player_id,
        );
        if let Some(season_card) = season_card {
            let cards = self
                .data
                .player_card_windows(
                    player_id,
                    &season_label_for_date(as_of),
                    as_of_for_slate(as_of),
                    &season_card.team,
                    season_card.position_group,
                )
                .await;
            if !cards.is_empty() {
                if let Err(err) = self.store.upsert_player_cards(&cards).await {
                    warn!(
                        "Failed upserting windowed player cards for player_id={} as_of={}: {}",
                        player_id, as_of, err
                    );
                }
            }
            let card = self.lookup_card(player_id, slate_date, window).await;
            return Some(card.unwrap_or(season_card));
        }

        self.populate_player_cards(as_of).await;
        self.lookup_card(player_id, slate_date, window).await
    }

    async fn populate_player_cards(&self, slate_date: NaiveDate) {
        let games = self.data.fetch_slate_games(slate_date).await;
        let slate_teams: BTreeSet<String> = games
            .iter()
            .flat_map(|g| [g.away_team.clone(), g.home_team.clone()])
            .collect();
        let season = season_label_for_date(slate_date);
        let snapshot = self
            .snapshot_for(&season, as_of_for_slate(slate_date), &slate_teams)
            .await;
        if snapshot.player_cards.is_empty() {
            return;
        }
        if let Err(err) = self.store.upsert_player_cards(&snapshot.player_cards).await {
            warn!("Player-card backfill upsert failed for {}: {}", slate_date, err);
        }
    }

    pub async fn get_game_lines(&self, slate_date: NaiveDate) -> GameLinesResponse {
        let key = game_lines_key(slate_date);
        if let Some(cached) = self.caches.game_lines.get(&key) {
            return cached;
        }
        let games = self.data.fetch_slate_games(slate_date).await;
        let response = GameLinesResponse {
            slate_date,
            lines: self.lines.fetch_game_lines(&games).await,
        };
        self.caches.game_lines.set(&key, response.clone());
        response
    }
}
