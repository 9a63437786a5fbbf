//! Environment-driven settings. Every value has a default so the server
//! starts with an empty environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::providers::odds::{OddsApiConfig, SportsMcpConfig};

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub cache_ttl: Duration,
    pub enable_roster_fetch: bool,
    pub roster_concurrency: usize,
    pub nba_stats_timeout: Duration,
    pub scoreboard_retries: u32,
    pub injury_timeout: Duration,
    pub odds_api: OddsApiConfig,
    pub sports_mcp: SportsMcpConfig,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_string(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env_string(key).and_then(|v| parse_bool(&v)).unwrap_or(default)
}

fn env_secs(key: &str, default: f64) -> Duration {
    let secs = env_or(key, default);
    Duration::try_from_secs_f64(secs).unwrap_or_else(|_| Duration::from_secs_f64(default))
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Settings {
    pub fn from_env() -> Self {
        let competitions = env_string("SPORTS_MCP_COMPETITIONS")
            .map(|raw| split_list(&raw))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| vec!["NBA".to_string(), "basketball-usa-nba".to_string()]);

        Settings {
            host: env_or("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: env_or("PORT", 8000),
            database_url: env_string("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://matchup_snapshots.db?mode=rwc".to_string()),
            cache_ttl: Duration::from_secs(env_or("CACHE_TTL_MINUTES", 360u64) * 60),
            enable_roster_fetch: env_bool("ENABLE_ROSTER_FETCH", true),
            roster_concurrency: env_or("ROSTER_CONCURRENCY", 8usize).max(1),
            nba_stats_timeout: env_secs("NBA_STATS_TIMEOUT_SECONDS", 15.0),
            scoreboard_retries: env_or("NBA_SCOREBOARD_RETRIES", 4u32).max(1),
            injury_timeout: env_secs("INJURY_TIMEOUT_SECONDS", 8.0),
            odds_api: OddsApiConfig {
                api_key: env_string("THE_ODDS_API_KEY"),
                sport: env_string("THE_ODDS_SPORT").unwrap_or_else(|| "basketball_nba".to_string()),
                regions: env_string("THE_ODDS_REGIONS").unwrap_or_else(|| "us".to_string()),
                markets: env_string("THE_ODDS_MARKETS").unwrap_or_else(|| "spreads,totals".to_string()),
                timeout: env_secs("THE_ODDS_TIMEOUT_SECONDS", 8.0),
            },
            sports_mcp: SportsMcpConfig {
                url: env_string("SPORTS_MCP_URL"),
                competitions,
                limit: env_or("SPORTS_MCP_LIMIT", 50u32),
                timeout: env_secs("SPORTS_MCP_TIMEOUT_SECONDS", 8.0),
            },
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
