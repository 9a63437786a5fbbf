//! Upstream collaborators: box scores and rosters, injuries, betting lines.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ProviderError;
use crate::frame::Frame;
use crate::models::{Game, GameLine, InjuryRecord};

pub mod injuries;
pub mod nba_stats;
pub mod odds;
pub mod teams;

/// Box-score, schedule and roster feed.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Games scheduled on `date` as the scoreboard lists them.
    async fn scoreboard(&self, date: NaiveDate) -> Result<Vec<Game>, ProviderError>;

    /// Team game logs limited to a single date.
    async fn team_logs_for_date(&self, season: &str, date: NaiveDate) -> Result<Frame, ProviderError>;

    async fn season_player_logs(&self, season: &str) -> Result<Frame, ProviderError>;

    async fn season_team_logs(&self, season: &str) -> Result<Frame, ProviderError>;

    async fn team_roster(&self, team_id: i64, season: &str) -> Result<Frame, ProviderError>;
}

/// A single injury report feed.
#[async_trait]
pub trait InjuryProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, slate_date: NaiveDate) -> Result<Vec<InjuryRecord>, ProviderError>;
}

/// Injuries for a slate, whatever the feeds behind it.
#[async_trait]
pub trait InjurySource: Send + Sync {
    async fn fetch_injuries(&self, slate_date: NaiveDate) -> Result<Vec<InjuryRecord>, ProviderError>;
}

/// A single betting-line feed. Always answers with exactly one line per game,
/// using a sentinel source when it has nothing.
#[async_trait]
pub trait LinesProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_lines(&self, games: &[Game]) -> Vec<GameLine>;
}

#[async_trait]
pub trait LinesSource: Send + Sync {
    async fn fetch_game_lines(&self, games: &[Game]) -> Vec<GameLine>;
}
