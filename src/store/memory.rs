use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::models::{MatchupResponse, PlayerCard, PlayerCardWindow, Window};
use crate::store::SnapshotStore;

type CardKey = (i64, String, NaiveDate, PlayerCardWindow);

/// Process-local store for tests and database-less runs.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<BTreeMap<(NaiveDate, Window), MatchupResponse>>,
    cards: RwLock<BTreeMap<CardKey, PlayerCard>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn best_card(
        &self,
        player_id: i64,
        window: PlayerCardWindow,
        as_of: Option<NaiveDate>,
    ) -> Option<PlayerCard> {
        self.cards
            .read()
            .values()
            .filter(|c| c.player_id == player_id && c.window == window)
            .filter(|c| as_of.is_none_or(|limit| c.as_of_date <= limit))
            .max_by(|a, b| {
                a.as_of_date
                    .cmp(&b.as_of_date)
                    .then_with(|| a.season.cmp(&b.season))
            })
            .cloned()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, slate_date: NaiveDate, window: Window) -> Result<Option<MatchupResponse>, StoreError> {
        Ok(self.snapshots.read().get(&(slate_date, window)).cloned())
    }

    async fn upsert(&self, response: &MatchupResponse) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .insert((response.slate_date, response.window), response.clone());
        Ok(())
    }

    async fn delete_slate(&self, slate_date: NaiveDate) -> Result<u64, StoreError> {
        let mut snapshots = self.snapshots.write();
        let before = snapshots.len();
        snapshots.retain(|(date, _), _| *date != slate_date);
        Ok((before - snapshots.len()) as u64)
    }

    async fn upsert_player_cards(&self, cards: &[PlayerCard]) -> Result<u64, StoreError> {
        let mut stored = self.cards.write();
        for card in cards {
            let key = (card.player_id, card.season.clone(), card.as_of_date, card.window);
            stored.insert(key, card.clone());
        }
        Ok(cards.len() as u64)
    }

    async fn get_latest_player_card(
        &self,
        player_id: i64,
        window: PlayerCardWindow,
    ) -> Result<Option<PlayerCard>, StoreError> {
        Ok(self.best_card(player_id, window, None))
    }

    async fn get_player_card_as_of(
        &self,
        player_id: i64,
        as_of: NaiveDate,
        window: PlayerCardWindow,
    ) -> Result<Option<PlayerCard>, StoreError> {
        Ok(self.best_card(player_id, window, Some(as_of)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn empty_response(window: Window) -> MatchupResponse {
        MatchupResponse {
            slate_date: d(11),
            as_of_date: d(10),
            window,
            games: vec![],
            injuries: vec![],
            players: vec![],
        }
    }

    #[tokio::test]
    async fn delete_slate_counts_rows() {
        let store = InMemorySnapshotStore::new();
        store.upsert(&empty_response(Window::Season)).await.unwrap();
        store.upsert(&empty_response(Window::Last10)).await.unwrap();
        assert_eq!(store.delete_slate(d(11)).await.unwrap(), 2);
        assert_eq!(store.delete_slate(d(11)).await.unwrap(), 0);
    }
}
