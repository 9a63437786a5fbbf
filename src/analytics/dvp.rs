//! Defense-vs-position tables and league rank tables.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::analytics::round_to;
use crate::frame::{PlayerGameRow, TeamGameRow};
use crate::models::{PositionGroup, Stat};

/// opponent -> group -> stat -> average allowed per game
pub type TeamGroupStats = BTreeMap<String, BTreeMap<PositionGroup, BTreeMap<Stat, f64>>>;

type GameTotals = BTreeMap<String, BTreeMap<PositionGroup, BTreeMap<String, [f64; 6]>>>;

/// Opponent code from matchup text: `BOS @ CHI` and `BOS vs. CHI` both give `CHI`.
pub fn parse_matchup_opponent(matchup: &str) -> Option<String> {
    let last = matchup.split_whitespace().last()?;
    let code = last.replace('.', "").trim().to_uppercase();
    if code.is_empty() { None } else { Some(code) }
}

/// Each team's ten most recent game ids.
pub fn team_last10_game_ids(rows: &[TeamGameRow]) -> HashMap<String, HashSet<String>> {
    let mut by_team: HashMap<&str, Vec<&TeamGameRow>> = HashMap::new();
    for row in rows {
        by_team.entry(row.team.as_str()).or_default().push(row);
    }

    by_team
        .into_iter()
        .map(|(team, mut games)| {
            games.sort_by(|a, b| b.game_date.cmp(&a.game_date));
            let ids: HashSet<String> = games.iter().take(10).map(|g| g.game_id.clone()).collect();
            (team.to_string(), ids)
        })
        .collect()
}

/// Per-game totals conceded to each position group, averaged over distinct games.
///
/// Only players with a known group count. Returns `(season, last10)`; the
/// last-10 table keeps a game only when it is among the opponent's own ten
/// most recent games.
pub fn build_dvp_tables(
    rows: &[PlayerGameRow],
    positions: &HashMap<i64, Vec<PositionGroup>>,
    team_last10: &HashMap<String, HashSet<String>>,
) -> (TeamGroupStats, TeamGroupStats) {
    if rows.is_empty() || positions.is_empty() {
        return (TeamGroupStats::new(), TeamGroupStats::new());
    }

    let mut season: GameTotals = BTreeMap::new();
    let mut last10: GameTotals = BTreeMap::new();

    for row in rows {
        let Some(groups) = positions.get(&row.player_id) else {
            continue;
        };
        let Some(opponent) = parse_matchup_opponent(&row.matchup) else {
            continue;
        };
        if row.game_id.is_empty() {
            continue;
        }
        let recent = team_last10
            .get(&opponent)
            .is_some_and(|ids| ids.contains(&row.game_id));

        for group in groups {
            accumulate(&mut season, &opponent, *group, &row.game_id, row);
            if recent {
                accumulate(&mut last10, &opponent, *group, &row.game_id, row);
            }
        }
    }

    (average(season), average(last10))
}

fn accumulate(
    totals: &mut GameTotals,
    opponent: &str,
    group: PositionGroup,
    game_id: &str,
    row: &PlayerGameRow,
) {
    let slot = totals
        .entry(opponent.to_string())
        .or_default()
        .entry(group)
        .or_default()
        .entry(game_id.to_string())
        .or_insert([0.0; 6]);
    for (i, stat) in Stat::ALL.iter().enumerate() {
        slot[i] += row.box_score.get(*stat);
    }
}

fn average(totals: GameTotals) -> TeamGroupStats {
    totals
        .into_iter()
        .map(|(team, groups)| {
            let groups: BTreeMap<PositionGroup, BTreeMap<Stat, f64>> = groups
                .into_iter()
                .filter(|(_, games)| !games.is_empty())
                .map(|(group, games)| {
                    let count = games.len() as f64;
                    let stats: BTreeMap<Stat, f64> = Stat::ALL
                        .iter()
                        .enumerate()
                        .map(|(i, stat)| {
                            let total: f64 = games.values().map(|g| g[i]).sum();
                            (*stat, round_to(total / count, 3))
                        })
                        .collect();
                    (group, stats)
                })
                .collect();
            (team, groups)
        })
        .collect()
}

/// team -> group -> stat -> rank, where rank 1 concedes the most.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankTable {
    ranks: HashMap<String, HashMap<PositionGroup, HashMap<Stat, u32>>>,
}

impl RankTable {
    /// Ranks every team of `teams` that has a value for the (group, stat) pair.
    ///
    /// Sorting is stable, so equal values keep the order of `teams`. Teams
    /// without a value are left unranked.
    pub fn build(stats: &TeamGroupStats, teams: &[String]) -> Self {
        let mut ranks: HashMap<String, HashMap<PositionGroup, HashMap<Stat, u32>>> = HashMap::new();

        for group in PositionGroup::ALL {
            for stat in Stat::ALL {
                let mut values: Vec<(&String, f64)> = teams
                    .iter()
                    .filter_map(|team| {
                        let value = stats.get(team)?.get(&group)?.get(&stat)?;
                        Some((team, *value))
                    })
                    .collect();
                values.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

                for (idx, (team, _)) in values.into_iter().enumerate() {
                    ranks
                        .entry(team.clone())
                        .or_default()
                        .entry(group)
                        .or_default()
                        .insert(stat, idx as u32 + 1);
                }
            }
        }

        RankTable { ranks }
    }

    pub fn rank(&self, team: &str, group: PositionGroup, stat: Stat) -> Option<u32> {
        self.ranks.get(team)?.get(&group)?.get(&stat).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BoxScore;
    use chrono::NaiveDate;

    fn player_row(id: i64, game: &str, day: u32, matchup: &str, pts: f64) -> PlayerGameRow {
        PlayerGameRow {
            player_id: id,
            player_name: format!("P{id}"),
            team: String::new(),
            game_id: game.to_string(),
            game_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            matchup: matchup.to_string(),
            minutes: Some(30.0),
            box_score: BoxScore {
                pts,
                ..BoxScore::default()
            },
            position: None,
            height_inches: None,
            height_text: None,
        }
    }

    fn team_row(team: &str, game: &str, day: u32) -> TeamGameRow {
        TeamGameRow {
            game_id: game.to_string(),
            team: team.to_string(),
            game_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            matchup: String::new(),
            box_score: BoxScore::default(),
        }
    }

    #[test]
    fn opponent_is_last_token() {
        assert_eq!(parse_matchup_opponent("BOS @ CHI").as_deref(), Some("CHI"));
        assert_eq!(parse_matchup_opponent("BOS vs. chi.").as_deref(), Some("CHI"));
        assert_eq!(parse_matchup_opponent("   "), None);
    }

    #[test]
    fn last10_keeps_most_recent_games() {
        let rows: Vec<_> = (1..=12).map(|d| team_row("BOS", &format!("g{d:02}"), d)).collect();
        let ids = team_last10_game_ids(&rows);
        let bos = &ids["BOS"];
        assert_eq!(bos.len(), 10);
        assert!(!bos.contains("g01"));
        assert!(!bos.contains("g02"));
        assert!(bos.contains("g12"));
    }

    #[test]
    fn dvp_averages_per_game_totals() {
        let positions = HashMap::from([(1, vec![PositionGroup::Guards]), (2, vec![PositionGroup::Guards])]);
        let rows = vec![
            player_row(1, "g1", 1, "BOS @ CHI", 10.0),
            player_row(2, "g1", 1, "BOS @ CHI", 20.0),
            player_row(1, "g2", 3, "BOS vs. CHI", 12.0),
            player_row(3, "g2", 3, "BOS vs. CHI", 99.0),
        ];
        let last10 = HashMap::from([("CHI".to_string(), HashSet::from(["g2".to_string()]))]);
        let (season, recent) = build_dvp_tables(&rows, &positions, &last10);

        assert_eq!(season["CHI"][&PositionGroup::Guards][&Stat::Pts], 21.0);
        assert_eq!(recent["CHI"][&PositionGroup::Guards][&Stat::Pts], 12.0);
        assert!(!season.contains_key("BOS"));
    }

    #[test]
    fn ranks_are_a_stable_permutation() {
        let teams: Vec<String> = ["ATL", "BOS", "CHI", "DAL"].iter().map(|s| s.to_string()).collect();
        let mut stats = TeamGroupStats::new();
        for (team, value) in [("ATL", 10.0), ("BOS", 30.0), ("CHI", 10.0), ("DAL", 20.0)] {
            stats
                .entry(team.to_string())
                .or_default()
                .entry(PositionGroup::Centers)
                .or_default()
                .insert(Stat::Reb, value);
        }
        let table = RankTable::build(&stats, &teams);
        let rank = |t: &str| table.rank(t, PositionGroup::Centers, Stat::Reb);
        assert_eq!(rank("BOS"), Some(1));
        assert_eq!(rank("DAL"), Some(2));
        assert_eq!(rank("ATL"), Some(3));
        assert_eq!(rank("CHI"), Some(4));
        assert_eq!(table.rank("BOS", PositionGroup::Guards, Stat::Reb), None);
    }

    #[test]
    fn absent_teams_get_no_rank() {
        let teams: Vec<String> = vec!["ATL".into(), "BOS".into()];
        let mut stats = TeamGroupStats::new();
        stats
            .entry("ATL".into())
            .or_default()
            .entry(PositionGroup::Guards)
            .or_default()
            .insert(Stat::Pts, 5.0);
        let table = RankTable::build(&stats, &teams);
        assert_eq!(table.rank("ATL", PositionGroup::Guards, Stat::Pts), Some(1));
        assert_eq!(table.rank("BOS", PositionGroup::Guards, Stat::Pts), None);
    }
}
