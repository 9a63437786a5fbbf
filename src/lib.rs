//! NBA slate matchups: defense-vs-position ranks, environment scores, player
//! cards and betting lines, served over HTTP.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod analytics;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod data_service;
pub mod error;
pub mod frame;
pub mod matchup_service;
pub mod models;
pub mod providers;
pub mod routes;
pub mod snapshot;
pub mod store;

use routes::AppState;

/// Builds the HTTP router over an already wired service.
pub fn app(state: AppState) -> Router {
    // Browser dashboards call this API from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "NBA Matchups API - v1.0" }))
        .route("/health", get(routes::health::health_check))
        .route("/api/meta", get(routes::matchups::get_meta))
        .route("/api/matchups", get(routes::matchups::get_matchups))
        .route("/api/refresh", post(routes::matchups::refresh))
        .route("/api/player-card", get(routes::matchups::get_player_card))
        .route("/api/game-lines", get(routes::matchups::get_game_lines))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
