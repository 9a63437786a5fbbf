use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Aggregation horizon for matchup rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Season,
    Last10,
}

impl Window {
    pub const ALL: [Window; 2] = [Window::Season, Window::Last10];

    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Season => "season",
            Window::Last10 => "last10",
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Window::Season
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Horizon for a single player's stat card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerCardWindow {
    Season,
    Last10,
    Last5,
}

impl PlayerCardWindow {
    pub const ALL: [PlayerCardWindow; 3] = [
        PlayerCardWindow::Season,
        PlayerCardWindow::Last10,
        PlayerCardWindow::Last5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerCardWindow::Season => "season",
            PlayerCardWindow::Last10 => "last10",
            PlayerCardWindow::Last5 => "last5",
        }
    }

    /// Number of most recent games the window covers, `None` for the full season.
    pub fn recent_games(&self) -> Option<usize> {
        match self {
            PlayerCardWindow::Season => None,
            PlayerCardWindow::Last10 => Some(10),
            PlayerCardWindow::Last5 => Some(5),
        }
    }
}

impl Default for PlayerCardWindow {
    fn default() -> Self {
        PlayerCardWindow::Season
    }
}

impl FromStr for PlayerCardWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "season" => Ok(PlayerCardWindow::Season),
            "last10" => Ok(PlayerCardWindow::Last10),
            "last5" => Ok(PlayerCardWindow::Last5),
            other => Err(format!("unknown player card window: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionGroup {
    Guards,
    Forwards,
    Centers,
}

impl PositionGroup {
    pub const ALL: [PositionGroup; 3] = [
        PositionGroup::Guards,
        PositionGroup::Forwards,
        PositionGroup::Centers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionGroup::Guards => "Guards",
            PositionGroup::Forwards => "Forwards",
            PositionGroup::Centers => "Centers",
        }
    }
}

impl FromStr for PositionGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Guards" => Ok(PositionGroup::Guards),
            "Forwards" => Ok(PositionGroup::Forwards),
            "Centers" => Ok(PositionGroup::Centers),
            other => Err(format!("unknown position group: {other}")),
        }
    }
}

/// Coarse favorability bucket derived from a defense-vs-position rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchupTier {
    Green,
    Yellow,
    Orange,
    Red,
}

impl MatchupTier {
    pub fn from_rank(rank: u32) -> Self {
        if rank <= 6 {
            MatchupTier::Green
        } else if rank <= 12 {
            MatchupTier::Yellow
        } else if rank <= 20 {
            MatchupTier::Orange
        } else {
            MatchupTier::Red
        }
    }
}

/// Stats tracked by the defense-vs-position tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stat {
    Pts,
    Reb,
    Ast,
    Fg3m,
    Stl,
    Blk,
}

impl Stat {
    pub const ALL: [Stat; 6] = [Stat::Pts, Stat::Reb, Stat::Ast, Stat::Fg3m, Stat::Stl, Stat::Blk];

    /// Upstream box-score column name.
    pub fn column(&self) -> &'static str {
        match self {
            Stat::Pts => "PTS",
            Stat::Reb => "REB",
            Stat::Ast => "AST",
            Stat::Fg3m => "FG3M",
            Stat::Stl => "STL",
            Stat::Blk => "BLK",
        }
    }

    /// Label used in `stat_ranks` / `stat_tiers`.
    pub fn display(&self) -> &'static str {
        match self {
            Stat::Fg3m => "3PM",
            other => other.column(),
        }
    }
}

/// Rank given to a player whose opponent has no entry in the rank table.
pub const DEFAULT_RANK: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    #[serde(default)]
    pub start_time_utc: Option<String>,
    pub away_team: String,
    pub home_team: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InjuryStatus {
    Out,
    Doubtful,
    Questionable,
    Probable,
    Gtd,
}

impl InjuryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjuryStatus::Out => "OUT",
            InjuryStatus::Doubtful => "DOUBTFUL",
            InjuryStatus::Questionable => "QUESTIONABLE",
            InjuryStatus::Probable => "PROBABLE",
            InjuryStatus::Gtd => "GTD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryRecord {
    pub player_name: String,
    pub team: String,
    pub status: InjuryStatus,
    #[serde(default)]
    pub comment: Option<String>,
    pub source: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatchup {
    pub player_id: i64,
    pub player_name: String,
    pub team: String,
    pub opponent: String,
    pub position_group: PositionGroup,
    pub avg_minutes: f64,
    #[serde(default)]
    pub injury_status: Option<InjuryStatus>,
    pub environment_score: f64,
    #[serde(default)]
    pub stat_ranks: BTreeMap<String, u32>,
    #[serde(default)]
    pub stat_tiers: BTreeMap<String, MatchupTier>,
}

impl PlayerMatchup {
    /// Best (lowest) rank across all stats, `DEFAULT_RANK` when none are known.
    pub fn best_rank(&self) -> u32 {
        self.stat_ranks.values().copied().min().unwrap_or(DEFAULT_RANK)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupResponse {
    pub slate_date: NaiveDate,
    pub as_of_date: NaiveDate,
    pub window: Window,
    pub games: Vec<Game>,
    pub injuries: Vec<InjuryRecord>,
    pub players: Vec<PlayerMatchup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLine {
    pub game_id: String,
    pub away_team: String,
    pub home_team: String,
    #[serde(default)]
    pub away_spread: Option<f64>,
    #[serde(default)]
    pub home_spread: Option<f64>,
    #[serde(default)]
    pub game_total: Option<f64>,
    pub source: String,
}

impl GameLine {
    /// Line record with no numbers, tagged with a sentinel source.
    pub fn placeholder(game: &Game, source: impl Into<String>) -> Self {
        GameLine {
            game_id: game.game_id.clone(),
            away_team: game.away_team.clone(),
            home_team: game.home_team.clone(),
            away_spread: None,
            home_spread: None,
            game_total: None,
            source: source.into(),
        }
    }

    pub fn has_numbers(&self) -> bool {
        self.away_spread.is_some() || self.home_spread.is_some() || self.game_total.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLinesResponse {
    pub slate_date: NaiveDate,
    pub lines: Vec<GameLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaResponse {
    pub season_label: String,
    pub current_date_et: NaiveDate,
    pub season_start: NaiveDate,
    pub season_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub slate_date: NaiveDate,
    pub cleared_keys: u64,
    pub recomputed: bool,
}

/// Per-player stat line for one (season, as-of date, window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCard {
    pub player_id: i64,
    pub player_name: String,
    pub team: String,
    pub season: String,
    pub as_of_date: NaiveDate,
    #[serde(default)]
    pub window: PlayerCardWindow,
    pub position_group: PositionGroup,
    pub mpg: f64,
    pub ppg: f64,
    pub assists_pg: f64,
    pub rebounds_pg: f64,
    pub steals_pg: f64,
    pub blocks_pg: f64,
    pub three_pa_pg: f64,
    pub three_pm_pg: f64,
    pub fta_pg: f64,
    pub ftm_pg: f64,
    pub fg_pct: f64,
    pub three_p_pct: f64,
    pub ft_pct: f64,
    pub turnovers_pg: f64,
    pub plus_minus_pg: f64,
}

/// Row from the `player_cards_windowed` table
#[derive(Debug, sqlx::FromRow)]
pub struct PlayerCardRow {
    pub player_id: i64,
    pub player_name: String,
    pub team: String,
    pub season: String,
    pub as_of_date: String,
    pub window_key: String,
    pub position_group: String,
    pub mpg: f64,
    pub ppg: f64,
    pub assists_pg: f64,
    pub rebounds_pg: f64,
    pub steals_pg: f64,
    pub blocks_pg: f64,
    pub three_pa_pg: f64,
    pub three_pm_pg: f64,
    pub fta_pg: f64,
    pub ftm_pg: f64,
    pub fg_pct: f64,
    pub three_p_pct: f64,
    pub ft_pct: f64,
    pub turnovers_pg: f64,
    pub plus_minus_pg: f64,
}

impl PlayerCardRow {
    pub fn to_player_card(&self) -> Result<PlayerCard, String> {
        let as_of_date = NaiveDate::parse_from_str(&self.as_of_date, "%Y-%m-%d")
            .map_err(|e| format!("bad as_of_date {:?}: {}", self.as_of_date, e))?;

        Ok(PlayerCard {
            player_id: self.player_id,
            player_name: self.player_name.clone(),
            team: self.team.clone(),
            season: self.season.clone(),
            as_of_date,
            window: self.window_key.parse()?,
            position_group: self.position_group.parse()?,
            mpg: self.mpg,
            ppg: self.ppg,
            assists_pg: self.assists_pg,
            rebounds_pg: self.rebounds_pg,
            steals_pg: self.steals_pg,
            blocks_pg: self.blocks_pg,
            three_pa_pg: self.three_pa_pg,
            three_pm_pg: self.three_pm_pg,
            fta_pg: self.fta_pg,
            ftm_pg: self.ftm_pg,
            fg_pct: self.fg_pct,
            three_p_pct: self.three_p_pct,
            ft_pct: self.ft_pct,
            turnovers_pg: self.turnovers_pg,
            plus_minus_pg: self.plus_minus_pg,
        })
    }
}

/// Season-to-date per-game averages for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerBaseline {
    pub player_id: i64,
    pub player_name: String,
    /// Team from the player's most recent game.
    pub team: String,
    pub games_played: u32,
    pub minutes: f64,
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub steals: f64,
    pub blocks: f64,
    pub fg3m: f64,
    pub fg3a: f64,
    pub fgm: f64,
    pub fga: f64,
    pub ftm: f64,
    pub fta: f64,
    pub turnovers: f64,
    pub plus_minus: f64,
    pub fg_pct: f64,
    pub fg3_pct: f64,
    pub ft_pct: f64,
    pub position: Option<String>,
    pub height_inches: Option<f64>,
    pub height_text: Option<String>,
}

/// One row per player per position group they are classified into.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationPoolEntry {
    pub player_id: i64,
    pub player_name: String,
    pub team: String,
    pub avg_minutes: f64,
    pub position_group: PositionGroup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        assert_eq!(MatchupTier::from_rank(1), MatchupTier::Green);
        assert_eq!(MatchupTier::from_rank(6), MatchupTier::Green);
        assert_eq!(MatchupTier::from_rank(7), MatchupTier::Yellow);
        assert_eq!(MatchupTier::from_rank(12), MatchupTier::Yellow);
        assert_eq!(MatchupTier::from_rank(13), MatchupTier::Orange);
        assert_eq!(MatchupTier::from_rank(20), MatchupTier::Orange);
        assert_eq!(MatchupTier::from_rank(21), MatchupTier::Red);
        assert_eq!(MatchupTier::from_rank(DEFAULT_RANK), MatchupTier::Red);
    }

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(serde_json::to_string(&Window::Last10).unwrap(), "\"last10\"");
        assert_eq!(serde_json::to_string(&PositionGroup::Centers).unwrap(), "\"Centers\"");
        assert_eq!(serde_json::to_string(&InjuryStatus::Gtd).unwrap(), "\"GTD\"");
        assert_eq!(serde_json::to_string(&MatchupTier::Orange).unwrap(), "\"orange\"");
        assert_eq!("last5".parse::<PlayerCardWindow>(), Ok(PlayerCardWindow::Last5));
    }

    #[test]
    fn best_rank_defaults_when_empty() {
        let player = PlayerMatchup {
            player_id: 1,
            player_name: "A".into(),
            team: "BOS".into(),
            opponent: "CHI".into(),
            position_group: PositionGroup::Guards,
            avg_minutes: 30.0,
            injury_status: None,
            environment_score: 50.0,
            stat_ranks: BTreeMap::new(),
            stat_tiers: BTreeMap::new(),
        };
        assert_eq!(player.best_rank(), DEFAULT_RANK);
    }
}
