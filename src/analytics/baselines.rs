use std::collections::BTreeMap;

use crate::frame::{BoxScore, PlayerGameRow};
use crate::models::PlayerBaseline;

#[derive(Default)]
struct Totals {
    games: u32,
    minutes: f64,
    box_score: BoxScore,
}

impl Totals {
    fn add(&mut self, minutes: f64, b: &BoxScore) {
        self.games += 1;
        self.minutes += minutes;
        let t = &mut self.box_score;
        t.pts += b.pts;
        t.reb += b.reb;
        t.ast += b.ast;
        t.stl += b.stl;
        t.blk += b.blk;
        t.fg3m += b.fg3m;
        t.fg3a += b.fg3a;
        t.fgm += b.fgm;
        t.fga += b.fga;
        t.ftm += b.ftm;
        t.fta += b.fta;
        t.oreb += b.oreb;
        t.tov += b.tov;
        t.plus_minus += b.plus_minus;
    }
}

fn pct(makes: f64, attempts: f64) -> f64 {
    if attempts > 0.0 { makes / attempts } else { 0.0 }
}

/// Season-to-date averages, one per player, ordered by player id.
///
/// Rows without minutes are ignored. The player's team and name come from
/// their most recent game.
pub fn build_player_baselines(rows: &[PlayerGameRow]) -> Vec<PlayerBaseline> {
    build_player_baselines_recent(rows, None)
}

/// Same as [`build_player_baselines`] but limited to each player's `recent`
/// most recent games when given.
pub fn build_player_baselines_recent(
    rows: &[PlayerGameRow],
    recent: Option<usize>,
) -> Vec<PlayerBaseline> {
    let mut by_player: BTreeMap<i64, Vec<&PlayerGameRow>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.minutes.is_some()) {
        by_player.entry(row.player_id).or_default().push(row);
    }

    by_player
        .into_iter()
        .filter_map(|(player_id, mut games)| {
            // stable: later input rows win ties on the same date
            games.sort_by_key(|r| r.game_date);
            if let Some(n) = recent {
                let skip = games.len().saturating_sub(n);
                games.drain(..skip);
            }
            let latest = *games.last()?;

            let mut totals = Totals::default();
            for game in &games {
                totals.add(game.minutes.unwrap_or(0.0), &game.box_score);
            }
            let gp = f64::from(totals.games.max(1));
            let t = totals.box_score;

            Some(PlayerBaseline {
                player_id,
                player_name: latest.player_name.clone(),
                team: latest.team.clone(),
                games_played: totals.games,
                minutes: totals.minutes / gp,
                points: t.pts / gp,
                rebounds: t.reb / gp,
                assists: t.ast / gp,
                steals: t.stl / gp,
                blocks: t.blk / gp,
                fg3m: t.fg3m / gp,
                fg3a: t.fg3a / gp,
                fgm: t.fgm / gp,
                fga: t.fga / gp,
                ftm: t.ftm / gp,
                fta: t.fta / gp,
                turnovers: t.tov / gp,
                plus_minus: t.plus_minus / gp,
                fg_pct: pct(t.fgm, t.fga),
                fg3_pct: pct(t.fg3m, t.fg3a),
                ft_pct: pct(t.ftm, t.fta),
                position: games.iter().rev().find_map(|g| g.position.clone()),
                height_inches: games.iter().rev().find_map(|g| g.height_inches),
                height_text: games.iter().rev().find_map(|g| g.height_text.clone()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(id: i64, team: &str, day: u32, minutes: Option<f64>, ast: f64, reb: f64) -> PlayerGameRow {
        PlayerGameRow {
            player_id: id,
            player_name: format!("Player {id}"),
            team: team.to_string(),
            game_id: format!("g{day}"),
            game_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            matchup: String::new(),
            minutes,
            box_score: BoxScore {
                ast,
                reb,
                fgm: 4.0,
                fga: 10.0,
                ..BoxScore::default()
            },
            position: None,
            height_inches: None,
            height_text: None,
        }
    }

    #[test]
    fn averages_and_latest_team() {
        let rows = vec![
            row(1, "NYK", 3, Some(20.0), 6.0, 4.0),
            row(1, "BOS", 9, Some(30.0), 8.0, 5.0),
            row(1, "NYK", 5, None, 30.0, 30.0),
            row(2, "CHI", 4, Some(12.0), 1.0, 9.0),
        ];
        let baselines = build_player_baselines(&rows);
        assert_eq!(baselines.len(), 2);

        let one = &baselines[0];
        assert_eq!(one.player_id, 1);
        assert_eq!(one.team, "BOS");
        assert_eq!(one.games_played, 2);
        assert_eq!(one.minutes, 25.0);
        assert_eq!(one.assists, 7.0);
        assert_eq!(one.rebounds, 4.5);
        assert_eq!(one.fg_pct, 0.4);
        assert_eq!(one.ft_pct, 0.0);
    }

    #[test]
    fn players_without_minutes_are_excluded() {
        let rows = vec![row(7, "MIA", 1, None, 1.0, 1.0)];
        assert!(build_player_baselines(&rows).is_empty());
    }

    #[test]
    fn recent_window_uses_latest_games() {
        let rows: Vec<_> = (1..=8)
            .map(|day| row(3, "DEN", day, Some(f64::from(day)), 0.0, 0.0))
            .collect();
        let recent = build_player_baselines_recent(&rows, Some(5));
        assert_eq!(recent[0].games_played, 5);
        assert_eq!(recent[0].minutes, 6.0);
    }
}
