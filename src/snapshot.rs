//! Snapshot assembly: everything derived for one (season, as-of date, team set).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use chrono::NaiveDate;

use crate::analytics::baselines::{build_player_baselines, build_player_baselines_recent};
use crate::analytics::dvp::{build_dvp_tables, team_last10_game_ids, RankTable};
use crate::analytics::positions::{classify, map_position_groups, PositionSource};
use crate::analytics::round_to;
use crate::analytics::scoring::{build_environment_scores, build_team_environment_metrics};
use crate::frame::{value_i64, value_string, Frame, PlayerGameRow, PlayerLogTable, TeamLogTable};
use crate::models::{
    PlayerBaseline, PlayerCard, PlayerCardWindow, PositionGroup, RotationPoolEntry, Window,
};

/// Minimum average minutes for the rotation pool.
pub const MIN_ROTATION_MINUTES: f64 = 5.0;

/// Rank table and environment scores for one aggregation window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowTables {
    pub ranks: RankTable,
    pub environment: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub rotation_pool: Vec<RotationPoolEntry>,
    pub player_cards: Vec<PlayerCard>,
    pub season: WindowTables,
    pub last10: WindowTables,
}

impl Snapshot {
    pub fn empty() -> Self {
        Snapshot::default()
    }

    pub fn window(&self, window: Window) -> &WindowTables {
        match window {
            Window::Season => &self.season,
            Window::Last10 => &self.last10,
        }
    }
}

/// One team's roster as listed upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamRoster {
    pub player_ids: BTreeSet<i64>,
    pub positions: HashMap<i64, Vec<PositionGroup>>,
}

impl TeamRoster {
    pub fn from_frame(frame: &Frame) -> Self {
        let Some(id_col) = frame.pick_column(&["PLAYER_ID"]) else {
            return TeamRoster::default();
        };
        let position_col = frame.pick_column(&["POSITION", "POS"]);

        let mut roster = TeamRoster::default();
        for row in &frame.rows {
            let Some(player_id) = row.get(id_col).and_then(value_i64).filter(|id| *id != 0) else {
                continue;
            };
            roster.player_ids.insert(player_id);
            let mapped = position_col
                .and_then(|idx| row.get(idx))
                .and_then(value_string)
                .map(|text| map_position_groups(&text))
                .unwrap_or_default();
            if !mapped.is_empty() {
                roster.positions.insert(player_id, mapped);
            }
        }
        roster
    }
}

/// Roster information merged across the teams of a slate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterData {
    pub positions: HashMap<i64, Vec<PositionGroup>>,
    pub team_player_ids: HashMap<String, BTreeSet<i64>>,
    team_by_player: HashMap<i64, String>,
}

impl RosterData {
    /// Teams whose roster could not be fetched contribute nothing.
    pub fn from_teams<'a>(teams: impl IntoIterator<Item = (&'a str, Option<&'a TeamRoster>)>) -> Self {
        let mut data = RosterData::default();
        for (team, roster) in teams {
            let Some(roster) = roster else { continue };
            data.positions
                .extend(roster.positions.iter().map(|(id, g)| (*id, g.clone())));
            if roster.player_ids.is_empty() {
                continue;
            }
            for id in &roster.player_ids {
                data.team_by_player.insert(*id, team.to_string());
            }
            data.team_player_ids
                .insert(team.to_string(), roster.player_ids.clone());
        }
        data
    }

    pub fn is_empty(&self) -> bool {
        self.team_player_ids.is_empty() && self.positions.is_empty()
    }

    pub fn team_for(&self, player_id: i64) -> Option<&str> {
        self.team_by_player.get(&player_id).map(String::as_str)
    }

    /// Team the player counts for, or `None` when filtered out by the slate
    /// or by a known roster that does not list them.
    fn eligible_team(
        &self,
        baseline: &PlayerBaseline,
        slate_teams: &BTreeSet<String>,
    ) -> Option<String> {
        let team = self
            .team_for(baseline.player_id)
            .map(str::to_string)
            .unwrap_or_else(|| baseline.team.trim().to_uppercase());
        if team.is_empty() || baseline.player_name.trim().is_empty() {
            return None;
        }
        if !slate_teams.is_empty() && !slate_teams.contains(&team) {
            return None;
        }
        if let Some(ids) = self.team_player_ids.get(&team) {
            if !ids.contains(&baseline.player_id) {
                return None;
            }
        }
        Some(team)
    }
}

/// What a snapshot is built for.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotScope<'a> {
    pub season: &'a str,
    pub as_of: NaiveDate,
    /// Empty means every team.
    pub slate_teams: &'a BTreeSet<String>,
    /// League teams in rank tie-break order.
    pub league_teams: &'a [String],
}

pub fn assemble_snapshot(
    scope: SnapshotScope<'_>,
    player_logs: &PlayerLogTable,
    team_logs: &TeamLogTable,
    roster: &RosterData,
) -> Snapshot {
    let started = Instant::now();
    let baselines = build_player_baselines(&player_logs.rows);
    let (rotation_pool, positions) = build_rotation_pool(&baselines, roster, scope.slate_teams);
    let player_cards = build_player_card_windows(&player_logs.rows, &baselines, &positions, roster, scope);

    let (season_stats, last10_stats) = if player_logs.has_dvp_columns {
        let last10_ids = team_last10_game_ids(&team_logs.rows);
        build_dvp_tables(&player_logs.rows, &positions, &last10_ids)
    } else {
        if !player_logs.is_empty() {
            tracing::warn!("Player logs lack matchup or stat columns; defense-vs-position tables left empty");
        }
        Default::default()
    };

    let (season_metrics, last10_metrics) = if team_logs.has_metric_columns {
        build_team_environment_metrics(&team_logs.rows)
    } else {
        if !team_logs.is_empty() {
            tracing::warn!("Team logs lack possession columns; environment metrics left empty");
        }
        Default::default()
    };

    let snapshot = Snapshot {
        season: WindowTables {
            ranks: RankTable::build(&season_stats, scope.league_teams),
            environment: build_environment_scores(&season_metrics, scope.league_teams),
        },
        last10: WindowTables {
            ranks: RankTable::build(&last10_stats, scope.league_teams),
            environment: build_environment_scores(&last10_metrics, scope.league_teams),
        },
        rotation_pool,
        player_cards,
    };

    tracing::info!(
        "Snapshot assembled season={} as_of={} teams={} pool={} cards={} in {:?}",
        scope.season,
        scope.as_of,
        scope.slate_teams.len(),
        snapshot.rotation_pool.len(),
        snapshot.player_cards.len(),
        started.elapsed()
    );
    snapshot
}

/// Rotation pool rows plus the group assignment of every pooled player.
pub fn build_rotation_pool(
    baselines: &[PlayerBaseline],
    roster: &RosterData,
    slate_teams: &BTreeSet<String>,
) -> (Vec<RotationPoolEntry>, HashMap<i64, Vec<PositionGroup>>) {
    let mut pool = Vec::new();
    let mut positions = HashMap::new();
    let mut inferred = 0usize;
    let mut defaulted = 0usize;

    for baseline in baselines {
        let Some(team) = roster.eligible_team(baseline, slate_teams) else {
            continue;
        };

        let (groups, source) = classify(
            baseline,
            roster.positions.get(&baseline.player_id).map(Vec::as_slice),
        );
        match source {
            PositionSource::Inferred => inferred += 1,
            PositionSource::Default => defaulted += 1,
            PositionSource::Explicit | PositionSource::Roster => {}
        }

        if baseline.minutes < MIN_ROTATION_MINUTES {
            continue;
        }

        let avg_minutes = round_to(baseline.minutes, 2);
        for group in &groups {
            pool.push(RotationPoolEntry {
                player_id: baseline.player_id,
                player_name: baseline.player_name.trim().to_string(),
                team: team.clone(),
                avg_minutes,
                position_group: *group,
            });
        }
        positions.insert(baseline.player_id, groups);
    }

    if inferred > 0 {
        tracing::info!("Inferred position groups for {} players from height and production", inferred);
    }
    if defaulted > 0 {
        tracing::warn!("Defaulted {} players to Guards for lack of position data", defaulted);
    }

    (pool, positions)
}

fn card_from_baseline(
    baseline: &PlayerBaseline,
    team: String,
    position_group: PositionGroup,
    season: &str,
    as_of: NaiveDate,
    window: PlayerCardWindow,
) -> PlayerCard {
    let r = |v: f64| round_to(v, 3);
    PlayerCard {
        player_id: baseline.player_id,
        player_name: baseline.player_name.trim().to_string(),
        team,
        season: season.to_string(),
        as_of_date: as_of,
        window,
        position_group,
        mpg: r(baseline.minutes),
        ppg: r(baseline.points),
        assists_pg: r(baseline.assists),
        rebounds_pg: r(baseline.rebounds),
        steals_pg: r(baseline.steals),
        blocks_pg: r(baseline.blocks),
        three_pa_pg: r(baseline.fg3a),
        three_pm_pg: r(baseline.fg3m),
        fta_pg: r(baseline.fta),
        ftm_pg: r(baseline.ftm),
        fg_pct: r(baseline.fg_pct),
        three_p_pct: r(baseline.fg3_pct),
        ft_pct: r(baseline.ft_pct),
        turnovers_pg: r(baseline.turnovers),
        plus_minus_pg: r(baseline.plus_minus),
    }
}

/// Cards for every eligible player in every card window.
pub fn build_player_card_windows(
    rows: &[PlayerGameRow],
    season_baselines: &[PlayerBaseline],
    positions: &HashMap<i64, Vec<PositionGroup>>,
    roster: &RosterData,
    scope: SnapshotScope<'_>,
) -> Vec<PlayerCard> {
    let mut cards = Vec::new();
    for window in PlayerCardWindow::ALL {
        let recent;
        let baselines = match window.recent_games() {
            None => season_baselines,
            Some(n) => {
                recent = build_player_baselines_recent(rows, Some(n));
                &recent[..]
            }
        };

        for baseline in baselines {
            let Some(team) = roster.eligible_team(baseline, scope.slate_teams) else {
                continue;
            };
            let group = positions
                .get(&baseline.player_id)
                .and_then(|g| g.first().copied())
                .unwrap_or(PositionGroup::Guards);
            cards.push(card_from_baseline(baseline, team, group, scope.season, scope.as_of, window));
        }
    }
    cards
}

/// Non-season cards for a single player, computed from already available logs.
pub fn build_player_card_windows_for_player(
    rows: &[PlayerGameRow],
    player_id: i64,
    season: &str,
    as_of: NaiveDate,
    fallback_team: &str,
    fallback_position: PositionGroup,
) -> Vec<PlayerCard> {
    let own: Vec<PlayerGameRow> = rows
        .iter()
        .filter(|r| r.player_id == player_id && r.game_date <= as_of)
        .cloned()
        .collect();
    if own.is_empty() {
        return Vec::new();
    }

    PlayerCardWindow::ALL
        .into_iter()
        .filter_map(|window| {
            let n = window.recent_games()?;
            let baseline = build_player_baselines_recent(&own, Some(n)).into_iter().next()?;
            let team = if fallback_team.is_empty() {
                baseline.team.clone()
            } else {
                fallback_team.to_string()
            };
            Some(card_from_baseline(&baseline, team, fallback_position, season, as_of, window))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BoxScore;
    use serde_json::json;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn log(id: i64, team: &str, day: u32, minutes: f64, position: Option<&str>) -> PlayerGameRow {
        PlayerGameRow {
            player_id: id,
            player_name: format!("Player {id}"),
            team: team.to_string(),
            game_id: format!("g{day}"),
            game_date: d(day),
            matchup: format!("{team} @ XXX"),
            minutes: Some(minutes),
            box_score: BoxScore {
                pts: 10.0,
                ast: 2.0,
                reb: 3.0,
                ..BoxScore::default()
            },
            position: position.map(str::to_string),
            height_inches: None,
            height_text: None,
        }
    }

    fn teams(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn rotation_pool_filters_minutes_and_slate() {
        let rows = vec![
            log(1, "BOS", 1, 30.0, Some("G-F")),
            log(2, "BOS", 1, 4.0, Some("C")),
            log(3, "MIA", 1, 25.0, Some("C")),
        ];
        let baselines = build_player_baselines(&rows);
        let (pool, positions) = build_rotation_pool(&baselines, &RosterData::default(), &teams(&["BOS"]));

        assert_eq!(pool.len(), 2);
        assert!(pool.iter().all(|e| e.player_id == 1));
        assert_eq!(pool[0].position_group, PositionGroup::Guards);
        assert_eq!(pool[1].position_group, PositionGroup::Forwards);
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn roster_overrides_team_and_restricts_ids() {
        let rows = vec![log(1, "NYK", 1, 30.0, None), log(2, "BOS", 1, 30.0, None)];
        let baselines = build_player_baselines(&rows);
        let bos = TeamRoster {
            player_ids: BTreeSet::from([1]),
            positions: HashMap::from([(1, vec![PositionGroup::Centers])]),
        };
        let roster = RosterData::from_teams([("BOS", Some(&bos)), ("NYK", None)]);
        let (pool, _) = build_rotation_pool(&baselines, &roster, &teams(&["BOS", "NYK"]));

        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].team, "BOS");
        assert_eq!(pool[0].position_group, PositionGroup::Centers);
    }

    #[test]
    fn roster_frame_maps_positions() {
        let frame = Frame::from_records(
            &["PLAYER_ID", "POSITION"],
            vec![vec![json!(5), json!("G")], vec![json!(6), json!("")], vec![json!(0), json!("C")]],
        );
        let roster = TeamRoster::from_frame(&frame);
        assert_eq!(roster.player_ids, BTreeSet::from([5, 6]));
        assert_eq!(roster.positions.get(&5), Some(&vec![PositionGroup::Guards]));
        assert!(!roster.positions.contains_key(&6));
    }

    #[test]
    fn cards_cover_every_window() {
        let rows: Vec<_> = (1..=12).map(|day| log(9, "DEN", day, f64::from(day), Some("C"))).collect();
        let slate = teams(&["DEN"]);
        let league = vec!["DEN".to_string()];
        let scope = SnapshotScope { season: "2025-26", as_of: d(12), slate_teams: &slate, league_teams: &league };
        let table = PlayerLogTable { rows, has_dvp_columns: false };
        let snapshot = assemble_snapshot(scope, &table, &TeamLogTable::default(), &RosterData::default());

        let card = |w: PlayerCardWindow| snapshot.player_cards.iter().find(|c| c.window == w).unwrap();
        assert_eq!(card(PlayerCardWindow::Season).mpg, 6.5);
        assert_eq!(card(PlayerCardWindow::Last10).mpg, 7.5);
        assert_eq!(card(PlayerCardWindow::Last5).mpg, 10.0);
        assert_eq!(card(PlayerCardWindow::Last5).position_group, PositionGroup::Centers);
        assert!(snapshot.season.ranks.is_empty());
        assert_eq!(snapshot.season.environment["DEN"], 50.0);
    }

    #[test]
    fn single_player_windows_use_fallbacks() {
        let rows: Vec<_> = (1..=6).map(|day| log(4, "LAL", day, 20.0, None)).collect();
        let cards = build_player_card_windows_for_player(&rows, 4, "2025-26", d(6), "LAC", PositionGroup::Forwards);
        assert_eq!(cards.len(), 2);
        assert!(cards.iter().all(|c| c.team == "LAC" && c.position_group == PositionGroup::Forwards));
        assert!(build_player_card_windows_for_player(&rows, 99, "2025-26", d(6), "", PositionGroup::Guards).is_empty());
    }
}
