use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::calendar::today_et;
use crate::error::ApiError;
use crate::models::{
    GameLinesResponse, MatchupResponse, MetaResponse, PlayerCard, PlayerCardWindow, RefreshResponse, Window,
};
use crate::routes::AppState;

/// Query parameters for the slate endpoints
#[derive(Debug, Deserialize)]
pub struct SlateQuery {
    /// Slate date (YYYY-MM-DD), today in US Eastern time when absent
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub window: Option<Window>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub recompute: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlayerCardQuery {
    pub player_id: i64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub window: Option<PlayerCardWindow>,
}

/// GET /api/meta - Season label and bounds for today's date
pub async fn get_meta(State(state): State<AppState>) -> Json<MetaResponse> {
    Json(state.service.get_meta())
}

/// GET /api/matchups - Ranked players for a slate
///
/// Query params:
/// - date: slate date (YYYY-MM-DD)
/// - window: `season` (default) or `last10`
pub async fn get_matchups(
    State(state): State<AppState>,
    Query(params): Query<SlateQuery>,
) -> Json<MatchupResponse> {
    let date = params.date.unwrap_or_else(today_et);
    let window = params.window.unwrap_or_default();
    Json(state.service.get_matchups(date, window).await)
}

/// POST /api/refresh - Drop cached results for a slate, optionally rebuilding them
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshQuery>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let date = params.date.unwrap_or_else(today_et);
    let response = state.service.refresh(date, params.recompute).await?;
    Ok(Json(response))
}

/// GET /api/player-card - Per-game averages for one player and window
pub async fn get_player_card(
    State(state): State<AppState>,
    Query(params): Query<PlayerCardQuery>,
) -> Result<Json<PlayerCard>, ApiError> {
    let window = params.window.unwrap_or_default();
    state
        .service
        .get_player_card(params.player_id, params.date, window)
        .await
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Player card not found for player {} and the selected date",
                params.player_id
            ))
        })
}

/// GET /api/game-lines - Spreads and totals for the slate's games
pub async fn get_game_lines(
    State(state): State<AppState>,
    Query(params): Query<SlateQuery>,
) -> Json<GameLinesResponse> {
    let date = params.date.unwrap_or_else(today_et);
    Json(state.service.get_game_lines(date).await)
}
