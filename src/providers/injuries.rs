//! Injury report feeds and the normalization that maps them onto `InjuryRecord`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::models::{InjuryRecord, InjuryStatus};
use crate::providers::{teams, InjuryProvider, InjurySource};

const NBA_CDN_BASE: &str = "https://cdn.nba.com/static/json/liveData/injuryReport";
const ESPN_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/injuries";

const MAX_SCAN_DEPTH: usize = 6;
const MAX_SCAN_NODES: usize = 5000;

const NAME_KEYS: &[&str] = &["playerName", "player_name", "name", "displayName", "fullName", "player"];
const TEAM_KEYS: &[&str] = &["teamAbbrev", "teamTricode", "team_abbreviation", "team", "teamName"];
const STATUS_KEYS: &[&str] = &["status", "injuryStatus", "injury_status", "currentStatus"];
const COMMENT_KEYS: &[&str] = &["description", "notes", "comment", "shortComment", "longComment", "reason"];
const UPDATED_KEYS: &[&str] = &["lastUpdated", "updatedAt", "date"];

const STATUS_TABLE: &[(&str, InjuryStatus)] = &[
    ("OUT", InjuryStatus::Out),
    ("O", InjuryStatus::Out),
    ("INACTIVE", InjuryStatus::Out),
    ("DOUBTFUL", InjuryStatus::Doubtful),
    ("QUESTIONABLE", InjuryStatus::Questionable),
    ("PROBABLE", InjuryStatus::Probable),
    ("GTD", InjuryStatus::Gtd),
    ("DTD", InjuryStatus::Gtd),
    ("DAY-TO-DAY", InjuryStatus::Gtd),
    ("GAME TIME DECISION", InjuryStatus::Gtd),
    ("GAME-TIME DECISION", InjuryStatus::Gtd),
];

/// Maps free-form status text onto the canonical statuses.
pub fn normalize_status(raw: &str) -> Option<InjuryStatus> {
    let text = raw.trim().to_uppercase();
    if text.is_empty() {
        return None;
    }
    if let Some((_, status)) = STATUS_TABLE.iter().find(|(key, _)| *key == text) {
        return Some(*status);
    }
    if text.contains("OUT") {
        Some(InjuryStatus::Out)
    } else if text.contains("DOUBT") {
        Some(InjuryStatus::Doubtful)
    } else if text.contains("QUESTION") {
        Some(InjuryStatus::Questionable)
    } else if text.contains("PROB") {
        Some(InjuryStatus::Probable)
    } else if text.contains("GAME") && text.contains("DECISION") {
        Some(InjuryStatus::Gtd)
    } else {
        None
    }
}

fn text_field(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match row.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(inner) => ["abbreviation", "displayName", "name", "description"]
            .iter()
            .find_map(|k| inner.get(*k).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    })
}

fn normalize_team(raw: &str) -> String {
    teams::normalize_team_token(raw)
        .map(str::to_string)
        .unwrap_or_else(|| raw.trim().to_uppercase())
}

fn parse_updated(row: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let raw = text_field(row, UPDATED_KEYS)?;
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Builds a record from one candidate row. `team_hint` is used when the row
/// itself does not carry a team. Rows without a name or a status are dropped.
pub fn record_from_row(row: &Map<String, Value>, team_hint: Option<&str>, source: &str) -> Option<InjuryRecord> {
    let player_name = text_field(row, NAME_KEYS)?;
    let comment = text_field(row, COMMENT_KEYS);
    let status = text_field(row, STATUS_KEYS)
        .and_then(|s| normalize_status(&s))
        .or_else(|| comment.as_deref().and_then(normalize_status))?;
    let team = text_field(row, TEAM_KEYS)
        .or_else(|| team_hint.map(str::to_string))
        .map(|t| normalize_team(&t))
        .unwrap_or_default();

    Some(InjuryRecord {
        player_name,
        team,
        status,
        comment,
        source: source.to_string(),
        updated_at: parse_updated(row),
    })
}

fn looks_like_injury_row(row: &Map<String, Value>) -> bool {
    NAME_KEYS.iter().any(|k| row.contains_key(*k))
        && (STATUS_KEYS.iter().any(|k| row.contains_key(*k)) || COMMENT_KEYS.iter().any(|k| row.contains_key(*k)))
}

/// Breadth-first scan for objects that carry name and status keys, bounded
/// in both depth and visited nodes.
pub fn collect_injury_rows(payload: &Value) -> Vec<&Map<String, Value>> {
    let mut found = Vec::new();
    let mut queue = std::collections::VecDeque::from([(payload, 0usize)]);
    let mut visited = 0usize;

    while let Some((node, depth)) = queue.pop_front() {
        visited += 1;
        if visited > MAX_SCAN_NODES {
            break;
        }
        match node {
            Value::Object(map) => {
                if looks_like_injury_row(map) {
                    found.push(map);
                    continue;
                }
                if depth < MAX_SCAN_DEPTH {
                    queue.extend(map.values().map(|v| (v, depth + 1)));
                }
            }
            Value::Array(items) if depth < MAX_SCAN_DEPTH => {
                queue.extend(items.iter().map(|v| (v, depth + 1)));
            }
            _ => {}
        }
    }
    found
}

/// `{"injuryReport": {"injuries": [...]}}`, falling back to a generic scan.
pub fn parse_nba_cdn(payload: &Value, source: &str) -> Vec<InjuryRecord> {
    let known = payload
        .get("injuryReport")
        .and_then(|r| r.get("injuries"))
        .and_then(Value::as_array);

    match known {
        Some(rows) => rows
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|row| record_from_row(row, None, source))
            .collect(),
        None => collect_injury_rows(payload)
            .into_iter()
            .filter_map(|row| record_from_row(row, None, source))
            .collect(),
    }
}

/// ESPN groups injuries by team: `{"injuries": [{"displayName": team, "injuries": [...]}]}`
/// with the player under `athlete`.
pub fn parse_espn(payload: &Value, source: &str) -> Vec<InjuryRecord> {
    let Some(groups) = payload.get("injuries").and_then(Value::as_array) else {
        return collect_injury_rows(payload)
            .into_iter()
            .filter_map(|row| record_from_row(row, None, source))
            .collect();
    };

    let mut records = Vec::new();
    for group in groups.iter().filter_map(Value::as_object) {
        let team_hint = text_field(group, &["abbreviation", "displayName", "name"]);
        let Some(rows) = group.get("injuries").and_then(Value::as_array) else {
            continue;
        };
        for row in rows.iter().filter_map(Value::as_object) {
            let mut flat = row.clone();
            if let Some(athlete) = row.get("athlete").and_then(Value::as_object) {
                if let Some(name) = athlete.get("displayName").cloned() {
                    flat.insert("playerName".to_string(), name);
                }
                if let Some(team) = athlete.get("team").cloned() {
                    flat.entry("team").or_insert(team);
                }
            }
            if let Some(record) = record_from_row(&flat, team_hint.as_deref(), source) {
                records.push(record);
            }
        }
    }
    records
}

async fn get_json(http: &reqwest::Client, url: &str) -> Result<Value, ProviderError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status { status: status.as_u16(), url: url.to_string() });
    }
    Ok(response.json::<Value>().await?)
}

/// The league CDN report: the dated file first, then the rolling one.
pub struct NbaCdnInjuries {
    http: reqwest::Client,
}

impl NbaCdnInjuries {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Ok(NbaCdnInjuries {
            http: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl InjuryProvider for NbaCdnInjuries {
    fn name(&self) -> &str {
        "nba-cdn"
    }

    async fn fetch(&self, slate_date: NaiveDate) -> Result<Vec<InjuryRecord>, ProviderError> {
        let urls = [
            format!("{NBA_CDN_BASE}/injuryReport_{}.json", slate_date.format("%Y%m%d")),
            format!("{NBA_CDN_BASE}/injuryReport.json"),
        ];
        let mut last_error = None;
        for url in &urls {
            match get_json(&self.http, url).await {
                Ok(payload) => return Ok(parse_nba_cdn(&payload, self.name())),
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error.unwrap_or_else(|| ProviderError::Shape("no injury report url".to_string())))
    }
}

pub struct EspnInjuries {
    http: reqwest::Client,
}

impl EspnInjuries {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Ok(EspnInjuries {
            http: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl InjuryProvider for EspnInjuries {
    fn name(&self) -> &str {
        "espn"
    }

    async fn fetch(&self, _slate_date: NaiveDate) -> Result<Vec<InjuryRecord>, ProviderError> {
        let payload = get_json(&self.http, ESPN_URL).await?;
        Ok(parse_espn(&payload, self.name()))
    }
}

/// Ordered injury providers. The first one with any records wins; results
/// are never merged across providers.
pub struct InjuryFeed {
    providers: Vec<Box<dyn InjuryProvider>>,
}

impl InjuryFeed {
    pub fn new(providers: Vec<Box<dyn InjuryProvider>>) -> Self {
        InjuryFeed { providers }
    }
}

#[async_trait]
impl InjurySource for InjuryFeed {
    async fn fetch_injuries(&self, slate_date: NaiveDate) -> Result<Vec<InjuryRecord>, ProviderError> {
        for provider in &self.providers {
            match provider.fetch(slate_date).await {
                Ok(records) if !records.is_empty() => {
                    info!(provider = provider.name(), count = records.len(), "Loaded injury report");
                    return Ok(records);
                }
                Ok(_) => info!(provider = provider.name(), "Injury provider returned no rows"),
                Err(err) => warn!(provider = provider.name(), error = %err, "Injury provider failed"),
            }
        }
        Ok(Vec::new())
    }
}
