use std::sync::Arc;

use crate::matchup_service::MatchupService;

pub mod health;
pub mod matchups;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchupService>,
}
