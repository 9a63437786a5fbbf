use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;

use crate::error::StoreError;
use crate::models::{MatchupResponse, PlayerCard, PlayerCardRow, PlayerCardWindow, Window};
use crate::store::SnapshotStore;

#[derive(Debug, sqlx::FromRow)]
struct PayloadRow {
    payload: String,
}

const CARD_COLUMNS: &str = r#"
    player_id, player_name, team, season, as_of_date, window_key, position_group,
    mpg, ppg, assists_pg, rebounds_pg, steals_pg, blocks_pg,
    three_pa_pg, three_pm_pg, fta_pg, ftm_pg, fg_pct, three_p_pct,
    ft_pct, turnovers_pg, plus_minus_pg
"#;

#[derive(Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteSnapshotStore { pool }
    }

    /// Creates tables and indexes when missing.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS matchup_snapshots (
                slate_date TEXT NOT NULL,
                window_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (slate_date, window_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_matchup_snapshots_date ON matchup_snapshots (slate_date)"#)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS player_cards_windowed (
                player_id INTEGER NOT NULL,
                player_name TEXT NOT NULL,
                team TEXT NOT NULL,
                season TEXT NOT NULL,
                as_of_date TEXT NOT NULL,
                window_key TEXT NOT NULL,
                position_group TEXT NOT NULL,
                mpg REAL NOT NULL,
                ppg REAL NOT NULL,
                assists_pg REAL NOT NULL,
                rebounds_pg REAL NOT NULL,
                steals_pg REAL NOT NULL,
                blocks_pg REAL NOT NULL,
                three_pa_pg REAL NOT NULL,
                three_pm_pg REAL NOT NULL,
                fta_pg REAL NOT NULL,
                ftm_pg REAL NOT NULL,
                fg_pct REAL NOT NULL,
                three_p_pct REAL NOT NULL,
                ft_pct REAL NOT NULL,
                turnovers_pg REAL NOT NULL,
                plus_minus_pg REAL NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (player_id, season, as_of_date, window_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_player_cards_windowed_lookup
               ON player_cards_windowed (player_id, window_key, season, as_of_date)"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn to_card(row: Option<PlayerCardRow>) -> Result<Option<PlayerCard>, StoreError> {
    row.map(|r| r.to_player_card().map_err(StoreError::Corrupt))
        .transpose()
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn get(&self, slate_date: NaiveDate, window: Window) -> Result<Option<MatchupResponse>, StoreError> {
        let row = sqlx::query_as::<_, PayloadRow>(
            r#"SELECT payload FROM matchup_snapshots WHERE slate_date = ? AND window_key = ?"#,
        )
        .bind(slate_date.to_string())
        .bind(window.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.payload)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, response: &MatchupResponse) -> Result<(), StoreError> {
        let payload = serde_json::to_string(response)?;
        sqlx::query(
            r#"
            INSERT INTO matchup_snapshots (slate_date, window_key, payload, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(slate_date, window_key)
            DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at
            "#,
        )
        .bind(response.slate_date.to_string())
        .bind(response.window.as_str())
        .bind(payload)
        .bind(now_stamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_slate(&self, slate_date: NaiveDate) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"DELETE FROM matchup_snapshots WHERE slate_date = ?"#)
            .bind(slate_date.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_player_cards(&self, cards: &[PlayerCard]) -> Result<u64, StoreError> {
        if cards.is_empty() {
            return Ok(0);
        }
        let updated_at = now_stamp();
        let mut tx = self.pool.begin().await?;
        for card in cards {
            sqlx::query(
                r#"
                INSERT INTO player_cards_windowed (
                    player_id, player_name, team, season, as_of_date, window_key, position_group,
                    mpg, ppg, assists_pg, rebounds_pg, steals_pg, blocks_pg,
                    three_pa_pg, three_pm_pg, fta_pg, ftm_pg, fg_pct, three_p_pct,
                    ft_pct, turnovers_pg, plus_minus_pg, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(player_id, season, as_of_date, window_key) DO UPDATE SET
                    player_name = excluded.player_name,
                    team = excluded.team,
                    position_group = excluded.position_group,
                    mpg = excluded.mpg,
                    ppg = excluded.ppg,
                    assists_pg = excluded.assists_pg,
                    rebounds_pg = excluded.rebounds_pg,
                    steals_pg = excluded.steals_pg,
                    blocks_pg = excluded.blocks_pg,
                    three_pa_pg = excluded.three_pa_pg,
                    three_pm_pg = excluded.three_pm_pg,
                    fta_pg = excluded.fta_pg,
                    ftm_pg = excluded.ftm_pg,
                    fg_pct = excluded.fg_pct,
                    three_p_pct = excluded.three_p_pct,
                    ft_pct = excluded.ft_pct,
                    turnovers_pg = excluded.turnovers_pg,
                    plus_minus_pg = excluded.plus_minus_pg,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(card.player_id)
            .bind(&card.player_name)
            .bind(&card.team)
            .bind(&card.season)
            .bind(card.as_of_date.to_string())
            .bind(card.window.as_str())
            .bind(card.position_group.as_str())
            .bind(card.mpg)
            .bind(card.ppg)
            .bind(card.assists_pg)
            .bind(card.rebounds_pg)
            .bind(card.steals_pg)
            .bind(card.blocks_pg)
            .bind(card.three_pa_pg)
            .bind(card.three_pm_pg)
            .bind(card.fta_pg)
            .bind(card.ftm_pg)
            .bind(card.fg_pct)
            .bind(card.three_p_pct)
            .bind(card.ft_pct)
            .bind(card.turnovers_pg)
            .bind(card.plus_minus_pg)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(cards.len() as u64)
    }

    async fn get_latest_player_card(
        &self,
        player_id: i64,
        window: PlayerCardWindow,
    ) -> Result<Option<PlayerCard>, StoreError> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM player_cards_windowed
             WHERE player_id = ? AND window_key = ?
             ORDER BY as_of_date DESC, season DESC
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, PlayerCardRow>(&sql)
            .bind(player_id)
            .bind(window.as_str())
            .fetch_optional(&self.pool)
            .await?;
        to_card(row)
    }

    async fn get_player_card_as_of(
        &self,
        player_id: i64,
        as_of: NaiveDate,
        window: PlayerCardWindow,
    ) -> Result<Option<PlayerCard>, StoreError> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM player_cards_windowed
             WHERE player_id = ? AND as_of_date <= ? AND window_key = ?
             ORDER BY as_of_date DESC, season DESC
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, PlayerCardRow>(&sql)
            .bind(player_id)
            .bind(as_of.to_string())
            .bind(window.as_str())
            .fetch_optional(&self.pool)
            .await?;
        to_card(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Game, InjuryRecord, InjuryStatus, MatchupTier, PlayerMatchup, PositionGroup};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::BTreeMap;

    async fn store() -> SqliteSnapshotStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteSnapshotStore::new(pool);
        store.initialize().await.unwrap();
        store
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn response(window: Window) -> MatchupResponse {
        MatchupResponse {
            slate_date: d(2, 11),
            as_of_date: d(2, 10),
            window,
            games: vec![Game {
                game_id: "0022500801".into(),
                start_time_utc: Some("2026-02-12T00:30:00Z".into()),
                away_team: "CHI".into(),
                home_team: "BOS".into(),
            }],
            injuries: vec![InjuryRecord {
                player_name: "Player One".into(),
                team: "BOS".into(),
                status: InjuryStatus::Questionable,
                comment: Some("Ankle".into()),
                source: "nba-cdn".into(),
                updated_at: None,
            }],
            players: vec![PlayerMatchup {
                player_id: 1,
                player_name: "Player One".into(),
                team: "BOS".into(),
                opponent: "CHI".into(),
                position_group: PositionGroup::Guards,
                avg_minutes: 31.25,
                injury_status: Some(InjuryStatus::Questionable),
                environment_score: 61.4,
                stat_ranks: BTreeMap::from([("PTS".to_string(), 3)]),
                stat_tiers: BTreeMap::from([("PTS".to_string(), MatchupTier::Green)]),
            }],
        }
    }

    fn card(as_of: NaiveDate, window: PlayerCardWindow, ppg: f64) -> PlayerCard {
        PlayerCard {
            player_id: 1,
            player_name: "Player One".into(),
            team: "BOS".into(),
            season: "2025-26".into(),
            as_of_date: as_of,
            window,
            position_group: PositionGroup::Guards,
            mpg: 30.0,
            ppg,
            assists_pg: 7.0,
            rebounds_pg: 4.5,
            steals_pg: 1.0,
            blocks_pg: 0.5,
            three_pa_pg: 6.0,
            three_pm_pg: 2.5,
            fta_pg: 4.0,
            ftm_pg: 3.5,
            fg_pct: 0.48,
            three_p_pct: 0.417,
            ft_pct: 0.875,
            turnovers_pg: 2.0,
            plus_minus_pg: 3.2,
        }
    }

    #[tokio::test]
    async fn upsert_get_delete_round_trip() {
        let store = store().await;
        let season = response(Window::Season);
        store.upsert(&season).await.unwrap();
        store.upsert(&response(Window::Last10)).await.unwrap();

        assert_eq!(store.get(d(2, 11), Window::Season).await.unwrap(), Some(season.clone()));

        let mut updated = season.clone();
        updated.players.clear();
        store.upsert(&updated).await.unwrap();
        assert_eq!(store.get(d(2, 11), Window::Season).await.unwrap(), Some(updated));

        assert_eq!(store.delete_slate(d(2, 11)).await.unwrap(), 2);
        assert_eq!(store.get(d(2, 11), Window::Season).await.unwrap(), None);
    }

    #[tokio::test]
    async fn player_card_lookups() {
        let store = store().await;
        let cards = vec![
            card(d(2, 1), PlayerCardWindow::Season, 20.0),
            card(d(2, 10), PlayerCardWindow::Season, 22.0),
            card(d(2, 10), PlayerCardWindow::Last5, 25.0),
        ];
        assert_eq!(store.upsert_player_cards(&cards).await.unwrap(), 3);
        assert_eq!(store.upsert_player_cards(&cards[..1]).await.unwrap(), 1);

        let latest = store.get_latest_player_card(1, PlayerCardWindow::Season).await.unwrap().unwrap();
        assert_eq!(latest.ppg, 22.0);

        let as_of = store.get_player_card_as_of(1, d(2, 5), PlayerCardWindow::Season).await.unwrap().unwrap();
        assert_eq!(as_of, cards[0]);

        assert!(store.get_player_card_as_of(1, d(1, 5), PlayerCardWindow::Season).await.unwrap().is_none());
        assert!(store.get_latest_player_card(1, PlayerCardWindow::Last10).await.unwrap().is_none());
        assert!(store.get_latest_player_card(2, PlayerCardWindow::Season).await.unwrap().is_none());
    }
}
