//! Betting-line feeds: The Odds API and a sports MCP server speaking JSON-RPC.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::models::{Game, GameLine};
use crate::providers::{teams, LinesProvider, LinesSource};

const ODDS_API_BASE: &str = "https://api.the-odds-api.com/v4/sports";
const MCP_TOOL: &str = "findEventsAndMarketsByCompetition";
const MAX_EVENT_NODES: usize = 2000;
const HAYSTACK_DEPTH: usize = 5;

fn to_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn placeholders(games: &[Game], source: &str) -> Vec<GameLine> {
    games.iter().map(|g| GameLine::placeholder(g, source)).collect()
}

fn lower_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default()
}

fn collect_strings<'a>(node: &'a Value, depth: usize, out: &mut Vec<&'a str>) {
    if depth > HAYSTACK_DEPTH {
        return;
    }
    match node {
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                out.push(trimmed);
            }
        }
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, depth + 1, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, depth + 1, out)),
        _ => {}
    }
}

/// Every string in the event, five levels deep, joined and lowercased.
pub fn event_haystack(event: &Value) -> String {
    let mut parts = Vec::new();
    collect_strings(event, 0, &mut parts);
    parts.join(" | ").to_lowercase()
}

/// Whole-word matcher for any alias of a team.
fn alias_pattern(abbr: &str) -> Option<Regex> {
    let aliases: Vec<String> = teams::aliases_for(abbr).iter().map(|a| regex::escape(a)).collect();
    Regex::new(&format!(r"\b(?:{})\b", aliases.join("|"))).ok()
}

/// First event whose text mentions both teams of the game.
pub fn match_event<'a>(game: &Game, events: &'a [Value]) -> Option<&'a Value> {
    let away = alias_pattern(&game.away_team)?;
    let home = alias_pattern(&game.home_team)?;
    events.iter().find(|event| {
        let haystack = event_haystack(event);
        away.is_match(&haystack) && home.is_match(&haystack)
    })
}

/// Spreads and total from a bookmaker-shaped event (`bookmakers[].markets[].outcomes[]`).
pub fn extract_bookmaker_lines(event: &Value) -> (Option<f64>, Option<f64>, Option<f64>) {
    let (mut away_spread, mut home_spread, mut total) = (None, None, None);
    let Some(event_map) = event.as_object() else {
        return (None, None, None);
    };
    let Some(bookmakers) = event.get("bookmakers").and_then(Value::as_array) else {
        return (None, None, None);
    };
    let home_name = lower_field(event_map, "home_team");
    let away_name = lower_field(event_map, "away_team");

    for bookmaker in bookmakers {
        let markets = bookmaker.get("markets").and_then(Value::as_array).into_iter().flatten();
        for market in markets.filter_map(Value::as_object) {
            let Some(outcomes) = market.get("outcomes").and_then(Value::as_array) else {
                continue;
            };
            let outcomes = outcomes.iter().filter_map(Value::as_object);
            match lower_field(market, "key").as_str() {
                "spreads" if away_spread.is_none() || home_spread.is_none() => {
                    for outcome in outcomes {
                        let Some(point) = to_f64(outcome.get("point")) else {
                            continue;
                        };
                        let name = lower_field(outcome, "name");
                        if name == away_name {
                            away_spread = Some(point);
                        } else if name == home_name {
                            home_spread = Some(point);
                        }
                    }
                }
                "totals" if total.is_none() => {
                    total = outcomes.filter_map(|o| to_f64(o.get("point"))).next();
                }
                _ => {}
            }
        }
        if away_spread.is_some() && home_spread.is_some() && total.is_some() {
            break;
        }
    }
    (away_spread, home_spread, total)
}

fn first_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| to_f64(map.get(*k)))
}

/// Spreads and total from a market-list event (`markets[].selections[]`).
pub fn extract_market_list_lines(event: &Value) -> (Option<f64>, Option<f64>, Option<f64>) {
    let (mut away_spread, mut home_spread, mut total) = (None, None, None);
    let Some(markets) = event.get("markets").and_then(Value::as_array) else {
        return (None, None, None);
    };

    for market in markets.iter().filter_map(Value::as_object) {
        let market_key = ["key", "name", "type", "marketType"]
            .iter()
            .map(|k| market.get(*k).and_then(Value::as_str).unwrap_or("").to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let selections: Vec<&Map<String, Value>> = market
            .get("selections")
            .and_then(Value::as_array)
            .or_else(|| market.get("outcomes").and_then(Value::as_array))
            .map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default();

        let is_spread = market_key.contains("handicap") || market_key.contains("spread");
        if is_spread && (away_spread.is_none() || home_spread.is_none()) {
            let numbers: Vec<f64> = selections
                .iter()
                .filter_map(|s| first_number(s, &["line", "handicap", "points"]))
                .collect();
            (away_spread, home_spread) = match numbers.as_slice() {
                [] => (None, None),
                [only] => (Some(*only), Some(-*only)),
                [first, second, ..] => (Some(*first), Some(*second)),
            };
        }

        let is_total = market_key.contains("total") || market_key.contains("over/under");
        if is_total && total.is_none() {
            total = first_number(market, &["line", "total", "points"]).or_else(|| {
                selections
                    .iter()
                    .find_map(|s| first_number(s, &["line", "total", "points"]))
            });
        }
    }
    (away_spread, home_spread, total)
}

fn line_for(game: &Game, lines: (Option<f64>, Option<f64>, Option<f64>), source: &str) -> GameLine {
    let (away_spread, home_spread, game_total) = lines;
    GameLine {
        away_spread,
        home_spread,
        game_total,
        ..GameLine::placeholder(game, source)
    }
}

#[derive(Debug, Clone)]
pub struct OddsApiConfig {
    pub api_key: Option<String>,
    pub sport: String,
    pub regions: String,
    pub markets: String,
    pub timeout: Duration,
}

pub struct OddsApiProvider {
    http: reqwest::Client,
    config: OddsApiConfig,
}

impl OddsApiProvider {
    pub fn new(config: OddsApiConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(OddsApiProvider { http, config })
    }

    async fn fetch_events(&self, api_key: &str) -> Result<Vec<Value>, ProviderError> {
        let url = format!("{ODDS_API_BASE}/{}/odds", self.config.sport);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", api_key),
                ("regions", self.config.regions.as_str()),
                ("markets", self.config.markets.as_str()),
                ("oddsFormat", "american"),
                ("dateFormat", "iso"),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), url });
        }
        match response.json::<Value>().await? {
            Value::Array(items) => Ok(items.into_iter().filter(Value::is_object).collect()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Exact full-name pairing first, the way the feed labels its events, then
/// alias search over the event text.
pub fn odds_api_lines(games: &[Game], events: &[Value]) -> Vec<GameLine> {
    if events.is_empty() {
        return placeholders(games, "odds-api-no-events");
    }
    games
        .iter()
        .map(|game| {
            let full = |abbr: &str| {
                teams::by_abbreviation(abbr)
                    .map(|t| t.full_name.to_lowercase())
                    .unwrap_or_else(|| abbr.to_lowercase())
            };
            let (away, home) = (full(&game.away_team), full(&game.home_team));
            let exact = events.iter().find(|event| {
                event.as_object().is_some_and(|m| {
                    lower_field(m, "away_team") == away && lower_field(m, "home_team") == home
                })
            });
            match exact.or_else(|| match_event(game, events)) {
                Some(event) => line_for(game, extract_bookmaker_lines(event), "odds-api"),
                None => GameLine::placeholder(game, "odds-api-no-match"),
            }
        })
        .collect()
}

#[async_trait]
impl LinesProvider for OddsApiProvider {
    fn name(&self) -> &str {
        "odds-api"
    }

    async fn fetch_lines(&self, games: &[Game]) -> Vec<GameLine> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return placeholders(games, "odds-api-unconfigured");
        };
        let events = match self.fetch_events(api_key).await {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "Odds API request failed");
                Vec::new()
            }
        };
        odds_api_lines(games, &events)
    }
}

#[derive(Debug, Clone)]
pub struct SportsMcpConfig {
    pub url: Option<String>,
    pub competitions: Vec<String>,
    pub limit: u32,
    pub timeout: Duration,
}

pub struct SportsMcpProvider {
    http: reqwest::Client,
    config: SportsMcpConfig,
}

/// Finds the event list inside a JSON-RPC reply. Tool results may carry the
/// list directly, as `content[].json`, or as JSON text in `content[].text`.
pub fn extract_events(body: &Value) -> Vec<Value> {
    let start = body.get("result").cloned().unwrap_or_else(|| body.clone());
    let mut queue = VecDeque::from([start]);
    let mut visited = 0;

    while let Some(node) = queue.pop_front() {
        visited += 1;
        if visited > MAX_EVENT_NODES {
            break;
        }
        match node {
            Value::Object(map) => {
                if let Some(Value::Array(events)) = map.get("events") {
                    if events.iter().all(Value::is_object) {
                        return events.clone();
                    }
                }
                if let Some(Value::Array(content)) = map.get("content") {
                    for item in content.iter().filter_map(Value::as_object) {
                        if let Some(inner @ (Value::Object(_) | Value::Array(_))) = item.get("json") {
                            queue.push_back(inner.clone());
                        }
                        if let Some(parsed) = item
                            .get("text")
                            .and_then(Value::as_str)
                            .and_then(|text| serde_json::from_str::<Value>(text).ok())
                        {
                            queue.push_back(parsed);
                        }
                    }
                }
                queue.extend(
                    map.into_iter()
                        .map(|(_, v)| v)
                        .filter(|v| v.is_object() || v.is_array()),
                );
            }
            Value::Array(items) => {
                queue.extend(items.into_iter().filter(|v| v.is_object() || v.is_array()));
            }
            _ => {}
        }
    }
    Vec::new()
}

fn event_key(event: &Value) -> Option<String> {
    ["id", "eventId", "name", "eventName"]
        .iter()
        .find_map(|k| match event.get(*k)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

impl SportsMcpProvider {
    pub fn new(config: SportsMcpConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(SportsMcpProvider { http, config })
    }

    async fn call_tool(&self, url: &str, id: usize, competition: &str) -> Result<Value, ProviderError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {
                "name": MCP_TOOL,
                "arguments": {"competitionName": competition, "limit": self.config.limit},
            },
        });
        let response = self.http.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), url: url.to_string() });
        }
        Ok(response.json::<Value>().await?)
    }

    /// Events across every configured competition, deduplicated by id or name.
    async fn fetch_events(&self, url: &str) -> Vec<Value> {
        let mut merged = Vec::new();
        let mut seen = HashSet::new();
        for (index, competition) in self.config.competitions.iter().enumerate() {
            let body = match self.call_tool(url, index + 1, competition).await {
                Ok(body) => body,
                Err(err) => {
                    warn!(competition = %competition, error = %err, "Sports MCP call failed");
                    continue;
                }
            };
            for event in extract_events(&body) {
                if let Some(key) = event_key(&event) {
                    if !seen.insert(key) {
                        continue;
                    }
                }
                merged.push(event);
            }
        }
        merged
    }
}

/// Lines for each game out of already fetched MCP events.
pub fn mcp_lines(games: &[Game], events: &[Value]) -> Vec<GameLine> {
    if events.is_empty() {
        return placeholders(games, "mcp-no-events");
    }
    games
        .iter()
        .map(|game| match match_event(game, events) {
            Some(event) => line_for(game, extract_market_list_lines(event), "mcp"),
            None => GameLine::placeholder(game, "mcp-no-match"),
        })
        .collect()
}

#[async_trait]
impl LinesProvider for SportsMcpProvider {
    fn name(&self) -> &str {
        "mcp"
    }

    async fn fetch_lines(&self, games: &[Game]) -> Vec<GameLine> {
        let url = match self.config.url.as_deref() {
            Some(url) if !url.is_empty() && !games.is_empty() => url,
            _ => return placeholders(games, "mcp-unconfigured"),
        };
        let events = self.fetch_events(url).await;
        mcp_lines(games, &events)
    }
}

/// Ordered line providers. The first answer carrying any number wins,
/// otherwise the last provider's sentinel lines are returned.
pub struct OddsFeed {
    providers: Vec<Box<dyn LinesProvider>>,
}

impl OddsFeed {
    pub fn new(providers: Vec<Box<dyn LinesProvider>>) -> Self {
        OddsFeed { providers }
    }
}

#[async_trait]
impl LinesSource for OddsFeed {
    async fn fetch_game_lines(&self, games: &[Game]) -> Vec<GameLine> {
        let mut last = placeholders(games, "no-provider");
        for provider in &self.providers {
            let lines = provider.fetch_lines(games).await;
            if lines.iter().any(GameLine::has_numbers) {
                info!(provider = provider.name(), games = games.len(), "Loaded game lines");
                return lines;
            }
            last = lines;
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(away: &str, home: &str) -> Game {
        Game {
            game_id: format!("{away}-{home}"),
            start_time_utc: None,
            away_team: away.to_string(),
            home_team: home.to_string(),
        }
    }

    #[test]
    fn odds_api_matches_by_full_name_and_reads_markets() {
        let events = vec![json!({
            "home_team": "Boston Celtics",
            "away_team": "Chicago Bulls",
            "bookmakers": [{
                "markets": [
                    {"key": "spreads", "outcomes": [
                        {"name": "Chicago Bulls", "point": 9.5},
                        {"name": "Boston Celtics", "point": -9.5}
                    ]},
                    {"key": "totals", "outcomes": [{"name": "Over", "point": "228.5"}]}
                ]
            }]
        })];
        let lines = odds_api_lines(&[game("CHI", "BOS"), game("NYK", "PHI")], &events);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].source, "odds-api");
        assert_eq!(lines[0].away_spread, Some(9.5));
        assert_eq!(lines[0].home_spread, Some(-9.5));
        assert_eq!(lines[0].game_total, Some(228.5));
        assert_eq!(lines[1].source, "odds-api-no-match");
        assert!(!lines[1].has_numbers());
    }

    #[test]
    fn empty_odds_feed_reports_no_events() {
        let lines = odds_api_lines(&[game("CHI", "BOS"), game("NYK", "PHI")], &[]);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.source == "odds-api-no-events" && !l.has_numbers()));
    }

    #[test]
    fn common_word_codes_do_not_match_prose() {
        let events = vec![
            json!({"name": "Denver at Portland", "note": "game was postponed, 48 min delay"}),
            json!({"name": "Wizards @ Timberwolves"}),
        ];
        assert_eq!(match_event(&game("WAS", "MIN"), &events), Some(&events[1]));
        assert_eq!(match_event(&game("WAS", "MIN"), &events[..1]), None);
    }

    #[test]
    fn aliases_match_on_word_boundaries() {
        let events = vec![
            json!({"name": "Brooklyn Netsuke Exhibition vs Heatwave"}),
            json!({"name": "Nets @ Heat", "markets": []}),
        ];
        let matched = match_event(&game("BKN", "MIA"), &events);
        assert_eq!(matched, Some(&events[1]));
    }

    #[test]
    fn single_handicap_mirrors_to_home_side() {
        let event = json!({
            "markets": [
                {"name": "Handicap", "selections": [{"handicap": "-4.5"}]},
                {"type": "Total Points", "line": 221.0, "selections": [{"line": 219.5}]}
            ]
        });
        assert_eq!(extract_market_list_lines(&event), (Some(-4.5), Some(4.5), Some(221.0)));
    }

    #[test]
    fn mcp_events_found_in_text_content() {
        let inner = json!({"data": {"events": [{"id": "e1", "name": "Knicks at 76ers"}]}});
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": inner.to_string()}]}
        });
        let events = extract_events(&body);
        assert_eq!(events.len(), 1);

        let lines = mcp_lines(&[game("NYK", "PHI"), game("CHI", "BOS")], &events);
        assert_eq!(lines[0].source, "mcp");
        assert_eq!(lines[1].source, "mcp-no-match");
        assert_eq!(mcp_lines(&[game("NYK", "PHI")], &[])[0].source, "mcp-no-events");
    }

    #[tokio::test]
    async fn unconfigured_providers_emit_sentinels_per_game() {
        let odds = OddsApiProvider::new(OddsApiConfig {
            api_key: None,
            sport: "basketball_nba".into(),
            regions: "us".into(),
            markets: "spreads,totals".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let mcp = SportsMcpProvider::new(SportsMcpConfig {
            url: None,
            competitions: vec!["NBA".into()],
            limit: 50,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let feed = OddsFeed::new(vec![Box::new(odds), Box::new(mcp)]);
        let lines = feed.fetch_game_lines(&[game("CHI", "BOS"), game("NYK", "PHI")]).await;
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.source == "mcp-unconfigured"));
    }
}
