use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nba_matchups_api::cache::TtlCache;
use nba_matchups_api::config::Settings;
use nba_matchups_api::data_service::{DataServiceConfig, LogCaches, NbaDataService};
use nba_matchups_api::matchup_service::{MatchupCaches, MatchupService};
use nba_matchups_api::providers::injuries::{EspnInjuries, InjuryFeed, NbaCdnInjuries};
use nba_matchups_api::providers::nba_stats::StatsNbaClient;
use nba_matchups_api::providers::odds::{OddsApiProvider, OddsFeed, SportsMcpProvider};
use nba_matchups_api::routes::AppState;
use nba_matchups_api::store::SqliteSnapshotStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting matchups api server...");

    dotenvy::dotenv().ok();
    let settings = Settings::from_env();

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;
    let store = SqliteSnapshotStore::new(pool);
    store.initialize().await?;

    tracing::info!("Snapshot store ready at {}", settings.database_url);

    let ttl = settings.cache_ttl;
    let stats = StatsNbaClient::new(settings.nba_stats_timeout)?;
    let data = NbaDataService::new(
        Arc::new(stats),
        LogCaches {
            player_logs: Arc::new(TtlCache::new(ttl)),
            team_logs: Arc::new(TtlCache::new(ttl)),
            rosters: Arc::new(TtlCache::new(ttl)),
        },
        DataServiceConfig {
            enable_roster_fetch: settings.enable_roster_fetch,
            roster_concurrency: settings.roster_concurrency,
            scoreboard_retries: settings.scoreboard_retries,
        },
    );
    let injuries = InjuryFeed::new(vec![
        Box::new(NbaCdnInjuries::new(settings.injury_timeout)?),
        Box::new(EspnInjuries::new(settings.injury_timeout)?),
    ]);
    let lines = OddsFeed::new(vec![
        Box::new(OddsApiProvider::new(settings.odds_api.clone())?),
        Box::new(SportsMcpProvider::new(settings.sports_mcp.clone())?),
    ]);

    let service = MatchupService::new(
        Arc::new(data),
        Arc::new(injuries),
        Arc::new(lines),
        Arc::new(store),
        MatchupCaches {
            matchups: Arc::new(TtlCache::new(ttl)),
            snapshots: Arc::new(TtlCache::new(ttl)),
            game_lines: Arc::new(TtlCache::new(ttl)),
        },
    );

    let app = nba_matchups_api::app(AppState {
        service: Arc::new(service),
    });

    let addr = settings.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
