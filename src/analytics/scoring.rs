use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::analytics::round_to;
use crate::frame::{BoxScore, TeamGameRow};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TeamMetrics {
    /// Points allowed per 100 possessions.
    pub def_rating: f64,
    pub pace: f64,
}

fn estimated_possessions(b: &BoxScore) -> f64 {
    b.fga + 0.44 * b.fta - b.oreb + b.tov
}

/// Season and last-10 defensive rating / pace per team, as `(season, last10)`.
///
/// The opponent of a row is the first other team listed for the same game.
/// Games with non-positive possessions are skipped.
pub fn build_team_environment_metrics(
    rows: &[TeamGameRow],
) -> (HashMap<String, TeamMetrics>, HashMap<String, TeamMetrics>) {
    let mut by_game: HashMap<&str, Vec<&TeamGameRow>> = HashMap::new();
    for row in rows {
        by_game.entry(row.game_id.as_str()).or_default().push(row);
    }

    let mut per_team: BTreeMap<&str, Vec<(NaiveDate, TeamMetrics)>> = BTreeMap::new();
    for row in rows {
        let Some(opp) = by_game
            .get(row.game_id.as_str())
            .and_then(|games| games.iter().find(|c| c.team != row.team))
        else {
            continue;
        };

        let possessions =
            0.5 * (estimated_possessions(&row.box_score) + estimated_possessions(&opp.box_score));
        if possessions <= 0.0 {
            continue;
        }
        per_team.entry(row.team.as_str()).or_default().push((
            row.game_date,
            TeamMetrics {
                def_rating: opp.box_score.pts / possessions * 100.0,
                pace: possessions,
            },
        ));
    }

    let mut season = HashMap::new();
    let mut last10 = HashMap::new();
    for (team, mut games) in per_team {
        games.sort_by(|a, b| b.0.cmp(&a.0));
        season.insert(team.to_string(), mean(&games));
        last10.insert(team.to_string(), mean(&games[..games.len().min(10)]));
    }
    (season, last10)
}

fn mean(games: &[(NaiveDate, TeamMetrics)]) -> TeamMetrics {
    let n = games.len().max(1) as f64;
    TeamMetrics {
        def_rating: games.iter().map(|(_, m)| m.def_rating).sum::<f64>() / n,
        pace: games.iter().map(|(_, m)| m.pace).sum::<f64>() / n,
    }
}

/// Min-max scale into [0, 100]; 50.0 when the range collapses.
pub fn normalize_score(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 50.0;
    }
    (value - min) / (max - min) * 100.0
}

/// `0.6 * defense + 0.4 * pace`, both normalized across `teams`, rounded to 2 places.
/// Teams without metrics are treated as zero for both.
pub fn build_environment_scores(
    metrics: &HashMap<String, TeamMetrics>,
    teams: &[String],
) -> BTreeMap<String, f64> {
    let values: Vec<TeamMetrics> = teams
        .iter()
        .map(|t| metrics.get(t).copied().unwrap_or_default())
        .collect();

    let bounds = |f: fn(&TeamMetrics) -> f64| {
        values.iter().map(f).fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 0.0))
    };
    let (min_def, max_def) = bounds(|m| m.def_rating);
    let (min_pace, max_pace) = bounds(|m| m.pace);

    teams
        .iter()
        .zip(values.iter())
        .map(|(team, m)| {
            let def = normalize_score(m.def_rating, min_def, max_def);
            let pace = normalize_score(m.pace, min_pace, max_pace);
            (team.clone(), round_to(0.6 * def + 0.4 * pace, 2))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(team: &str, game: &str, day: u32, fga: f64, pts: f64) -> TeamGameRow {
        TeamGameRow {
            game_id: game.to_string(),
            team: team.to_string(),
            game_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            matchup: String::new(),
            box_score: BoxScore {
                fga,
                pts,
                ..BoxScore::default()
            },
        }
    }

    fn teams(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn metrics_use_symmetric_possessions() {
        let rows = vec![
            row("BOS", "g1", 1, 90.0, 110.0),
            row("CHI", "g1", 1, 110.0, 100.0),
            row("LAL", "g2", 2, 0.0, 80.0),
            row("MIA", "g2", 2, 0.0, 90.0),
        ];
        let (season, last10) = build_team_environment_metrics(&rows);
        let bos = season["BOS"];
        assert_eq!(bos.pace, 100.0);
        assert_eq!(bos.def_rating, 100.0);
        assert_eq!(season["CHI"].def_rating, 110.0);
        assert_eq!(last10["BOS"], bos);
        assert!(!season.contains_key("LAL"));
    }

    #[test]
    fn last10_uses_most_recent_games() {
        let mut rows = Vec::new();
        for day in 1..=12u32 {
            let game = format!("g{day}");
            let pts = if day <= 2 { 200.0 } else { 100.0 };
            rows.push(row("BOS", &game, day, 100.0, 100.0));
            rows.push(row("NYK", &game, day, 100.0, pts));
        }
        let (season, last10) = build_team_environment_metrics(&rows);
        assert_eq!(last10["BOS"].def_rating, 100.0);
        assert!(season["BOS"].def_rating > 100.0);
    }

    #[test]
    fn degenerate_range_is_fifty() {
        let metrics = HashMap::from([
            ("ATL".to_string(), TeamMetrics { def_rating: 110.0, pace: 99.0 }),
            ("BOS".to_string(), TeamMetrics { def_rating: 110.0, pace: 99.0 }),
        ]);
        let scores = build_environment_scores(&metrics, &teams(&["ATL", "BOS"]));
        assert_eq!(scores["ATL"], 50.0);
        assert_eq!(scores["BOS"], 50.0);

        let empty = build_environment_scores(&HashMap::new(), &teams(&["ATL", "BOS", "CHI"]));
        assert!(empty.values().all(|s| *s == 50.0));
    }

    #[test]
    fn scores_blend_and_stay_in_range() {
        let metrics = HashMap::from([
            ("ATL".to_string(), TeamMetrics { def_rating: 120.0, pace: 90.0 }),
            ("BOS".to_string(), TeamMetrics { def_rating: 100.0, pace: 100.0 }),
            ("CHI".to_string(), TeamMetrics { def_rating: 110.0, pace: 95.0 }),
        ]);
        let scores = build_environment_scores(&metrics, &teams(&["ATL", "BOS", "CHI"]));
        assert_eq!(scores["ATL"], 60.0);
        assert_eq!(scores["BOS"], 40.0);
        assert_eq!(scores["CHI"], 50.0);
        assert!(scores.values().all(|s| (0.0..=100.0).contains(s)));
    }
}
