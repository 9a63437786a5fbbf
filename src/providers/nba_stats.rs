//! Client for the stats.nba.com JSON endpoints.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;

use crate::error::ProviderError;
use crate::frame::{value_i64, value_string, Frame};
use crate::models::Game;
use crate::providers::{teams, StatsProvider};

const BASE_URL: &str = "https://stats.nba.com/stats";
const SEASON_TYPE: &str = "Regular Season";

pub struct StatsNbaClient {
    http: reqwest::Client,
    base_url: String,
}

impl StatsNbaClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            ),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
        headers.insert("x-nba-stats-origin", HeaderValue::from_static("stats"));
        headers.insert("x-nba-stats-token", HeaderValue::from_static("true"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(StatsNbaClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.http.get(&url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), url });
        }
        Ok(response.json::<Value>().await?)
    }

    async fn first_result_set(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Frame, ProviderError> {
        let payload = self.get_json(endpoint, params).await?;
        Frame::from_result_set(&payload, 0)
            .ok_or_else(|| ProviderError::Shape(format!("{endpoint}: no result set")))
    }
}

fn us_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// Games from the scoreboard `GameHeader` set, with codes taken from
/// `LineScore` when present and the team directory otherwise.
pub fn games_from_scoreboard(header: &Frame, line_score: Option<&Frame>) -> Vec<Game> {
    let mut codes: HashMap<(String, i64), String> = HashMap::new();
    if let Some(lines) = line_score {
        let game_col = lines.pick_column(&["GAME_ID"]);
        let team_col = lines.pick_column(&["TEAM_ID"]);
        let abbr_col = lines.pick_column(&["TEAM_ABBREVIATION"]);
        for row in &lines.rows {
            let get = |idx: Option<usize>| idx.and_then(|i| row.get(i));
            let game_id = get(game_col).and_then(value_string);
            let team_id = get(team_col).and_then(value_i64);
            let abbr = get(abbr_col).and_then(value_string);
            if let (Some(game_id), Some(team_id), Some(abbr)) = (game_id, team_id, abbr) {
                codes.insert((game_id, team_id), abbr.to_uppercase());
            }
        }
    }

    let game_col = header.pick_column(&["GAME_ID"]);
    let home_col = header.pick_column(&["HOME_TEAM_ID"]);
    let away_col = header.pick_column(&["VISITOR_TEAM_ID"]);
    let start_col = header.pick_column(&["GAME_DATE_EST"]);

    header
        .rows
        .iter()
        .filter_map(|row| {
            let get = |idx: Option<usize>| idx.and_then(|i| row.get(i));
            let game_id = get(game_col).and_then(value_string)?;
            let home_id = get(home_col).and_then(value_i64).unwrap_or(0);
            let away_id = get(away_col).and_then(value_i64).unwrap_or(0);
            let resolve = |team_id: i64| {
                codes
                    .get(&(game_id.clone(), team_id))
                    .cloned()
                    .or_else(|| teams::by_id(team_id).map(|t| t.abbreviation.to_string()))
            };
            Some(Game {
                home_team: resolve(home_id)?,
                away_team: resolve(away_id)?,
                start_time_utc: get(start_col).and_then(value_string),
                game_id,
            })
        })
        .collect()
}

#[async_trait]
impl StatsProvider for StatsNbaClient {
    async fn scoreboard(&self, date: NaiveDate) -> Result<Vec<Game>, ProviderError> {
        let params = [
            ("GameDate", us_date(date)),
            ("LeagueID", "00".to_string()),
            ("DayOffset", "0".to_string()),
        ];
        let payload = self.get_json("scoreboardv2", &params).await?;
        let Some(header) = Frame::from_named_result_set(&payload, "GameHeader")
            .or_else(|| Frame::from_result_set(&payload, 0))
        else {
            return Ok(Vec::new());
        };
        let line_score = Frame::from_named_result_set(&payload, "LineScore");
        Ok(games_from_scoreboard(&header, line_score.as_ref()))
    }

    async fn team_logs_for_date(&self, season: &str, date: NaiveDate) -> Result<Frame, ProviderError> {
        let params = [
            ("PlayerOrTeam", "T".to_string()),
            ("Season", season.to_string()),
            ("SeasonTypeNullable", SEASON_TYPE.to_string()),
            ("LeagueID", "00".to_string()),
            ("DateFromNullable", us_date(date)),
            ("DateToNullable", us_date(date)),
        ];
        self.first_result_set("leaguegamefinder", &params).await
    }

    async fn season_player_logs(&self, season: &str) -> Result<Frame, ProviderError> {
        let params = [
            ("Season", season.to_string()),
            ("SeasonType", SEASON_TYPE.to_string()),
            ("LeagueID", "00".to_string()),
        ];
        self.first_result_set("playergamelogs", &params).await
    }

    async fn season_team_logs(&self, season: &str) -> Result<Frame, ProviderError> {
        let params = [
            ("PlayerOrTeam", "T".to_string()),
            ("Season", season.to_string()),
            ("SeasonTypeNullable", SEASON_TYPE.to_string()),
            ("LeagueID", "00".to_string()),
        ];
        self.first_result_set("leaguegamefinder", &params).await
    }

    async fn team_roster(&self, team_id: i64, season: &str) -> Result<Frame, ProviderError> {
        let params = [
            ("TeamID", team_id.to_string()),
            ("Season", season.to_string()),
            ("LeagueID", "00".to_string()),
        ];
        self.first_result_set("commonteamroster", &params).await
    }
}
