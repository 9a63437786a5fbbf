//! Durable storage for computed slates and player cards.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;
use crate::models::{MatchupResponse, PlayerCard, PlayerCardWindow, Window};

pub mod memory;
pub mod sqlite;

pub use memory::InMemorySnapshotStore;
pub use sqlite::SqliteSnapshotStore;

/// Upsert-by-key storage. Responses are keyed by (slate date, window) and
/// cards by (player id, season, as-of date, window).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, slate_date: NaiveDate, window: Window) -> Result<Option<MatchupResponse>, StoreError>;

    async fn upsert(&self, response: &MatchupResponse) -> Result<(), StoreError>;

    /// Removes both windows of a slate, returning the number of rows deleted.
    async fn delete_slate(&self, slate_date: NaiveDate) -> Result<u64, StoreError>;

    async fn upsert_player_cards(&self, cards: &[PlayerCard]) -> Result<u64, StoreError>;

    /// Card with the newest as-of date (then season) for the window.
    async fn get_latest_player_card(
        &self,
        player_id: i64,
        window: PlayerCardWindow,
    ) -> Result<Option<PlayerCard>, StoreError>;

    /// Newest card whose as-of date is on or before `as_of`.
    async fn get_player_card_as_of(
        &self,
        player_id: i64,
        as_of: NaiveDate,
        window: PlayerCardWindow,
    ) -> Result<Option<PlayerCard>, StoreError>;
}
