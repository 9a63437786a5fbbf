//! Slate data: the schedule, season logs and rosters behind a snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::cache::Cache;
use crate::calendar::season_label_for_date;
use crate::error::{ProviderError, ShapeError};
use crate::frame::{Frame, PlayerLogTable, TeamGameRow, TeamLogTable};
use crate::models::{Game, PlayerCard, PositionGroup};
use crate::providers::teams::{self, TeamInfo, TEAMS};
use crate::providers::StatsProvider;
use crate::snapshot::{
    assemble_snapshot, build_player_card_windows_for_player, RosterData, Snapshot, SnapshotScope, TeamRoster,
};

/// What the matchup orchestrator needs from the stats side.
#[async_trait]
pub trait SlateDataSource: Send + Sync {
    /// Games on the slate, deduplicated and sorted. Empty when nothing is known.
    async fn fetch_slate_games(&self, slate_date: NaiveDate) -> Vec<Game>;

    async fn build_snapshot(
        &self,
        season: &str,
        as_of: NaiveDate,
        slate_teams: &BTreeSet<String>,
    ) -> Result<Snapshot, ProviderError>;

    /// Recent-window cards for one player from logs already held locally.
    async fn player_card_windows(
        &self,
        player_id: i64,
        season: &str,
        as_of: NaiveDate,
        fallback_team: &str,
        fallback_position: PositionGroup,
    ) -> Vec<PlayerCard>;
}

#[derive(Debug, Clone)]
pub struct DataServiceConfig {
    pub enable_roster_fetch: bool,
    pub roster_concurrency: usize,
    pub scoreboard_retries: u32,
}

impl Default for DataServiceConfig {
    fn default() -> Self {
        DataServiceConfig {
            enable_roster_fetch: true,
            roster_concurrency: 8,
            scoreboard_retries: 4,
        }
    }
}

/// Caches for raw upstream data. Season logs are keyed by season label,
/// rosters by `{season}:{team_id}` with `None` recording a failed fetch.
#[derive(Clone)]
pub struct LogCaches {
    pub player_logs: Arc<dyn Cache<Arc<PlayerLogTable>>>,
    pub team_logs: Arc<dyn Cache<Arc<TeamLogTable>>>,
    pub rosters: Arc<dyn Cache<Option<TeamRoster>>>,
}

trait SeasonLog: Send + Sync + Default + 'static {
    const LABEL: &'static str;
    fn parse(frame: &Frame) -> Result<Self, ShapeError>;
    fn latest(&self) -> Option<NaiveDate>;
    fn is_empty(&self) -> bool;
}

impl SeasonLog for PlayerLogTable {
    const LABEL: &'static str = "player";

    fn parse(frame: &Frame) -> Result<Self, ShapeError> {
        PlayerLogTable::from_frame(frame)
    }

    fn latest(&self) -> Option<NaiveDate> {
        self.max_game_date()
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl SeasonLog for TeamLogTable {
    const LABEL: &'static str = "team";

    fn parse(frame: &Frame) -> Result<Self, ShapeError> {
        TeamLogTable::from_frame(frame)
    }

    fn latest(&self) -> Option<NaiveDate> {
        self.max_game_date()
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reuses the cached season only when it already covers `as_of`; a refetch
/// that comes back empty or broken falls back to the stale copy.
async fn cached_season_log<T, F, Fut>(
    cache: &dyn Cache<Arc<T>>,
    season: &str,
    as_of: NaiveDate,
    fetch: F,
) -> Arc<T>
where
    T: SeasonLog,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Frame, ProviderError>>,
{
    let cached = cache.get(season);
    if let Some(table) = &cached {
        if table.latest().is_some_and(|latest| latest >= as_of) {
            return table.clone();
        }
    }

    let fetched = match fetch().await {
        Ok(frame) => T::parse(&frame).map_err(|err| {
            warn!("Season {} logs for {} have an unexpected shape: {}", T::LABEL, season, err);
        }),
        Err(err) => {
            warn!("Season {} logs fetch failed for {}: {}", T::LABEL, season, err);
            Err(())
        }
    };

    match fetched {
        Ok(table) if !table.is_empty() => {
            let table = Arc::new(table);
            cache.set(season, table.clone());
            table
        }
        _ => cached.unwrap_or_default(),
    }
}

/// Derives games for `date` from team game logs. The home side is the row
/// whose matchup reads `vs.`, the away side the one with `@`.
pub fn games_from_team_logs(rows: &[TeamGameRow], date: NaiveDate) -> Vec<Game> {
    let mut grouped: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.game_date == date) {
        if row.game_id.trim().is_empty() || row.team.is_empty() {
            continue;
        }
        let entries = grouped.entry(row.game_id.trim()).or_default();
        match entries.iter_mut().find(|(team, _)| *team == row.team) {
            Some(entry) => entry.1 = row.matchup.as_str(),
            None => entries.push((row.team.as_str(), row.matchup.as_str())),
        }
    }

    grouped
        .into_iter()
        .filter_map(|(game_id, entries)| {
            let mut home = None;
            let mut away = None;
            for (team, matchup) in &entries {
                if matchup.contains(" VS.") || matchup.contains(" VS ") {
                    home = Some(*team);
                } else if matchup.contains('@') {
                    away = Some(*team);
                }
            }
            let other = |known: &str| {
                entries
                    .iter()
                    .map(|(team, _)| *team)
                    .find(|team| *team != known)
            };
            if entries.len() == 2 {
                match (home, away) {
                    (None, Some(a)) => home = other(a),
                    (Some(h), None) => away = other(h),
                    _ => {}
                }
            }
            Some(Game {
                game_id: game_id.to_string(),
                start_time_utc: None,
                away_team: away?.to_string(),
                home_team: home?.to_string(),
            })
        })
        .collect()
}

/// One game per (away, home) pair. A game with a start time replaces one
/// without, otherwise the lower game id wins.
pub fn dedupe_games(games: Vec<Game>) -> Vec<Game> {
    let mut kept: BTreeMap<(String, String), Game> = BTreeMap::new();
    for game in games {
        let key = (game.away_team.clone(), game.home_team.clone());
        let replace = match kept.get(&key) {
            None => true,
            Some(existing) => match (existing.start_time_utc.is_some(), game.start_time_utc.is_some()) {
                (false, true) => true,
                (true, false) => false,
                _ => game.game_id < existing.game_id,
            },
        };
        if replace {
            kept.insert(key, game);
        }
    }

    let mut games: Vec<Game> = kept.into_values().collect();
    games.sort_by(|a, b| {
        let start = |g: &Game| g.start_time_utc.clone().unwrap_or_default();
        (start(a), &a.away_team, &a.home_team, &a.game_id).cmp(&(start(b), &b.away_team, &b.home_team, &b.game_id))
    });
    games
}

pub struct NbaDataService {
    stats: Arc<dyn StatsProvider>,
    caches: LogCaches,
    config: DataServiceConfig,
}

impl NbaDataService {
    pub fn new(stats: Arc<dyn StatsProvider>, caches: LogCaches, config: DataServiceConfig) -> Self {
        NbaDataService { stats, caches, config }
    }

    async fn scoreboard_games(&self, slate_date: NaiveDate) -> Vec<Game> {
        let attempts = self.config.scoreboard_retries.max(1);
        for attempt in 1..=attempts {
            match self.stats.scoreboard(slate_date).await {
                Ok(games) => return games,
                Err(err) => warn!(
                    "Scoreboard fetch failed for {} (attempt {}/{}): {}",
                    slate_date, attempt, attempts, err
                ),
            }
        }
        warn!("Scoreboard fetch exhausted retries for {}", slate_date);
        Vec::new()
    }

    async fn fallback_games(&self, slate_date: NaiveDate) -> Vec<Game> {
        let season = season_label_for_date(slate_date);
        if let Some(cached) = self.caches.team_logs.get(&season) {
            let games = games_from_team_logs(&cached.rows, slate_date);
            if !games.is_empty() {
                return games;
            }
        }

        let frame = match self.stats.team_logs_for_date(&season, slate_date).await {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Fallback slate fetch failed for {}: {}", slate_date, err);
                return Vec::new();
            }
        };
        match TeamLogTable::from_frame(&frame) {
            Ok(table) => games_from_team_logs(&table.rows, slate_date),
            Err(err) => {
                warn!("Fallback slate logs for {} unusable: {}", slate_date, err);
                Vec::new()
            }
        }
    }

    pub async fn season_player_logs(&self, season: &str, as_of: NaiveDate) -> Arc<PlayerLogTable> {
        cached_season_log(self.caches.player_logs.as_ref(), season, as_of, || {
            self.stats.season_player_logs(season)
        })
        .await
    }

    pub async fn season_team_logs(&self, season: &str, as_of: NaiveDate) -> Arc<TeamLogTable> {
        cached_season_log(self.caches.team_logs.as_ref(), season, as_of, || {
            self.stats.season_team_logs(season)
        })
        .await
    }

    fn roster_key(season: &str, team: &TeamInfo) -> String {
        format!("{season}:{}", team.id)
    }

    /// Rosters for the slate (every team when the slate is empty), fetched
    /// concurrently for teams not yet cached.
    pub async fn roster_data(&self, season: &str, slate_teams: &BTreeSet<String>) -> RosterData {
        if !self.config.enable_roster_fetch {
            return RosterData::default();
        }
        let wanted: Vec<&'static TeamInfo> = if slate_teams.is_empty() {
            TEAMS.iter().collect()
        } else {
            slate_teams.iter().filter_map(|abbr| teams::by_abbreviation(abbr)).collect()
        };
        // (cache key, team id, abbreviation) for teams not yet cached
        let missing: Vec<(String, i64, String)> = wanted
            .iter()
            .map(|team| (Self::roster_key(season, team), team.id, team.abbreviation.to_string()))
            .filter(|(key, _, _)| self.caches.rosters.get(key).is_none())
            .collect();

        if !missing.is_empty() {
            let stats = self.stats.clone();
            let season_owned = season.to_string();
            let fetched: Vec<(String, Option<TeamRoster>)> = stream::iter(missing)
                .map(move |(key, team_id, abbreviation)| {
                    let stats = stats.clone();
                    let season = season_owned.clone();
                    async move {
                        match stats.team_roster(team_id, &season).await {
                            Ok(frame) => (key, Some(TeamRoster::from_frame(&frame))),
                            Err(err) => {
                                warn!("Roster fetch failed for {} season={}: {}", abbreviation, season, err);
                                (key, None)
                            }
                        }
                    }
                })
                .buffer_unordered(self.config.roster_concurrency.max(1))
                .collect()
                .await;
            for (key, roster) in fetched {
                self.caches.rosters.set(&key, roster);
            }
        }

        let rosters: Vec<(&str, Option<TeamRoster>)> = wanted
            .iter()
            .map(|team| {
                let roster = self.caches.rosters.get(&Self::roster_key(season, team)).flatten();
                (team.abbreviation, roster)
            })
            .collect();
        RosterData::from_teams(rosters.iter().map(|(abbr, roster)| (*abbr, roster.as_ref())))
    }
}

#[async_trait]
impl SlateDataSource for NbaDataService {
    async fn fetch_slate_games(&self, slate_date: NaiveDate) -> Vec<Game> {
        let games = self.scoreboard_games(slate_date).await;
        if !games.is_empty() {
            return dedupe_games(games);
        }
        let fallback = self.fallback_games(slate_date).await;
        if !fallback.is_empty() {
            info!("Using fallback slate games for {} ({} games)", slate_date, fallback.len());
        }
        dedupe_games(fallback)
    }

    async fn build_snapshot(
        &self,
        season: &str,
        as_of: NaiveDate,
        slate_teams: &BTreeSet<String>,
    ) -> Result<Snapshot, ProviderError> {
        let player_logs = self.season_player_logs(season, as_of).await.as_of(as_of);
        let team_logs = self.season_team_logs(season, as_of).await.as_of(as_of);
        let roster = self.roster_data(season, slate_teams).await;
        let league_teams = teams::league_abbreviations();
        let scope = SnapshotScope {
            season,
            as_of,
            slate_teams,
            league_teams: &league_teams,
        };
        Ok(assemble_snapshot(scope, &player_logs, &team_logs, &roster))
    }

    async fn player_card_windows(
        &self,
        player_id: i64,
        season: &str,
        as_of: NaiveDate,
        fallback_team: &str,
        fallback_position: PositionGroup,
    ) -> Vec<PlayerCard> {
        let Some(logs) = self.caches.player_logs.get(season) else {
            return Vec::new();
        };
        build_player_card_windows_for_player(&logs.rows, player_id, season, as_of, fallback_team, fallback_position)
    }
}
