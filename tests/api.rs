use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use nba_matchups_api::analytics::dvp::{RankTable, TeamGroupStats};
use nba_matchups_api::cache::TtlCache;
use nba_matchups_api::data_service::SlateDataSource;
use nba_matchups_api::error::ProviderError;
use nba_matchups_api::matchup_service::{MatchupCaches, MatchupService};
use nba_matchups_api::models::{
    Game, GameLine, InjuryRecord, InjuryStatus, PlayerCard, PositionGroup, RotationPoolEntry, Stat,
};
use nba_matchups_api::providers::{InjurySource, LinesSource};
use nba_matchups_api::routes::AppState;
use nba_matchups_api::snapshot::{Snapshot, WindowTables};
use nba_matchups_api::store::InMemorySnapshotStore;

struct SlateFake {
    snapshot_builds: AtomicUsize,
}

#[async_trait]
impl SlateDataSource for SlateFake {
    async fn fetch_slate_games(&self, _slate_date: NaiveDate) -> Vec<Game> {
        vec![Game {
            game_id: "0022500801".to_string(),
            start_time_utc: Some("2026-02-12T00:30:00Z".to_string()),
            away_team: "CHI".to_string(),
            home_team: "BOS".to_string(),
        }]
    }

    async fn build_snapshot(
        &self,
        _season: &str,
        _as_of: NaiveDate,
        _slate_teams: &BTreeSet<String>,
    ) -> Result<Snapshot, ProviderError> {
        self.snapshot_builds.fetch_add(1, Ordering::SeqCst);
        let mut stats = TeamGroupStats::new();
        stats
            .entry("BOS".to_string())
            .or_default()
            .entry(PositionGroup::Guards)
            .or_default()
            .insert(Stat::Ast, 9.0);
        let teams: Vec<String> = vec!["BOS".to_string(), "CHI".to_string()];
        let tables = WindowTables {
            ranks: RankTable::build(&stats, &teams),
            environment: BTreeMap::from([("BOS".to_string(), 72.5)]),
        };
        Ok(Snapshot {
            rotation_pool: vec![RotationPoolEntry {
                player_id: 1630245,
                player_name: "Ayo Dosunmu".to_string(),
                team: "CHI".to_string(),
                avg_minutes: 28.4,
                position_group: PositionGroup::Guards,
            }],
            player_cards: Vec::new(),
            season: tables.clone(),
            last10: tables,
        })
    }

    async fn player_card_windows(
        &self,
        _player_id: i64,
        _season: &str,
        _as_of: NaiveDate,
        _fallback_team: &str,
        _fallback_position: PositionGroup,
    ) -> Vec<PlayerCard> {
        Vec::new()
    }
}

struct InjuryFake;

#[async_trait]
impl InjurySource for InjuryFake {
    async fn fetch_injuries(&self, _slate_date: NaiveDate) -> Result<Vec<InjuryRecord>, ProviderError> {
        Ok(vec![InjuryRecord {
            player_name: "Ayo Dosunmu".to_string(),
            team: "CHI".to_string(),
            status: InjuryStatus::Gtd,
            comment: Some("Calf".to_string()),
            source: "test".to_string(),
            updated_at: None,
        }])
    }
}

struct LinesFake;

#[async_trait]
impl LinesSource for LinesFake {
    async fn fetch_game_lines(&self, games: &[Game]) -> Vec<GameLine> {
        games.iter().map(|g| GameLine::placeholder(g, "odds-api-unconfigured")).collect()
    }
}

fn test_app() -> (axum::Router, Arc<SlateFake>) {
    let data = Arc::new(SlateFake {
        snapshot_builds: AtomicUsize::new(0),
    });
    let ttl = Duration::from_secs(300);
    let service = MatchupService::new(
        data.clone(),
        Arc::new(InjuryFake),
        Arc::new(LinesFake),
        Arc::new(InMemorySnapshotStore::new()),
        MatchupCaches {
            matchups: Arc::new(TtlCache::new(ttl)),
            snapshots: Arc::new(TtlCache::new(ttl)),
            game_lines: Arc::new(TtlCache::new(ttl)),
        },
    );
    let app = nba_matchups_api::app(AppState {
        service: Arc::new(service),
    });
    (app, data)
}

async fn send(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn matchups_serialize_ranks_tiers_and_overlay() {
    let (app, data) = test_app();
    let (status, body) = send(&app, "GET", "/api/matchups?date=2026-02-11&window=last10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slate_date"], "2026-02-11");
    assert_eq!(body["as_of_date"], "2026-02-10");
    assert_eq!(body["window"], "last10");

    let player = &body["players"][0];
    assert_eq!(player["opponent"], "BOS");
    assert_eq!(player["position_group"], "Guards");
    assert_eq!(player["injury_status"], "GTD");
    assert_eq!(player["environment_score"], 72.5);
    assert_eq!(player["stat_ranks"]["AST"], 1);
    assert_eq!(player["stat_tiers"]["AST"], "green");
    assert_eq!(player["stat_ranks"]["PTS"], 30);
    assert_eq!(player["stat_tiers"]["3PM"], "red");

    send(&app, "GET", "/api/matchups?date=2026-02-11&window=last10").await;
    assert_eq!(data.snapshot_builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_player_card_is_not_found() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/api/player-card?player_id=42&date=2026-02-11").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "404 Not Found");
}

#[tokio::test]
async fn refresh_reports_cleared_keys() {
    let (app, _) = test_app();
    send(&app, "GET", "/api/matchups?date=2026-02-11").await;
    let (status, body) = send(&app, "POST", "/api/refresh?date=2026-02-11").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recomputed"], false);
    // cached response, cached snapshot, stored row
    assert_eq!(body["cleared_keys"], 3);
}

#[tokio::test]
async fn game_lines_emit_one_line_per_game() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/api/game-lines?date=2026-02-11").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["lines"][0]["source"], "odds-api-unconfigured");
    assert!(body["lines"][0]["game_total"].is_null());
}

#[tokio::test]
async fn meta_lists_season_bounds() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/api/meta").await;
    assert_eq!(status, StatusCode::OK);
    let start = body["season_start"].as_str().unwrap_or_default();
    assert!(start.ends_with("-10-01"));
}
