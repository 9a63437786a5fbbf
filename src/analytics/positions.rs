use crate::models::{PlayerBaseline, PositionGroup};

/// Where a player's position groups came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    Explicit,
    Roster,
    Inferred,
    /// Guards, applied when nothing else is known.
    Default,
}

fn push_unique(groups: &mut Vec<PositionGroup>, group: PositionGroup) {
    if !groups.contains(&group) {
        groups.push(group);
    }
}

/// Maps position text such as `G-F`, `PF/C` or `Guard` onto groups, in order.
pub fn map_position_groups(position: &str) -> Vec<PositionGroup> {
    let normalized = position.to_uppercase().replace('/', "-");
    let mut groups = Vec::new();

    for part in normalized.split('-').map(str::trim).filter(|p| !p.is_empty()) {
        match part {
            "PG" | "SG" | "G" => push_unique(&mut groups, PositionGroup::Guards),
            "SF" | "PF" | "F" => push_unique(&mut groups, PositionGroup::Forwards),
            "C" => push_unique(&mut groups, PositionGroup::Centers),
            _ => {}
        }
    }

    if normalized.contains("GUARD") {
        push_unique(&mut groups, PositionGroup::Guards);
    }
    if normalized.contains("FORWARD") {
        push_unique(&mut groups, PositionGroup::Forwards);
    }
    if normalized.contains("CENTER") {
        push_unique(&mut groups, PositionGroup::Centers);
    }

    groups
}

/// Height in inches from a numeric cell or `feet-inches` text.
pub fn parse_height_inches(height_inches: Option<f64>, height_text: Option<&str>) -> Option<i64> {
    if let Some(inches) = height_inches {
        return Some(inches.round() as i64);
    }
    let text = height_text?.trim();
    if let Some((feet, inches)) = text.split_once('-') {
        if let (Ok(feet), Ok(inches)) = (feet.parse::<i64>(), inches.parse::<i64>()) {
            return Some(feet * 12 + inches);
        }
    }
    text.parse::<i64>().ok()
}

/// Guesses a group from height, then from assist/rebound production.
/// Empty when there is nothing to go on.
pub fn infer_position_groups(
    height_inches: Option<f64>,
    height_text: Option<&str>,
    assists: Option<f64>,
    rebounds: Option<f64>,
) -> Vec<PositionGroup> {
    if let Some(height) = parse_height_inches(height_inches, height_text) {
        return if height <= 77 {
            vec![PositionGroup::Guards]
        } else if height >= 82 {
            vec![PositionGroup::Centers]
        } else {
            vec![PositionGroup::Forwards]
        };
    }

    match (assists, rebounds) {
        (None, None) => Vec::new(),
        (Some(ast), _) if ast >= 4.0 => vec![PositionGroup::Guards],
        (_, Some(reb)) if reb >= 7.0 => vec![PositionGroup::Centers],
        _ => vec![PositionGroup::Forwards],
    }
}

/// Explicit position, then roster position, then inference, then Guards.
pub fn classify(
    baseline: &PlayerBaseline,
    roster_positions: Option<&[PositionGroup]>,
) -> (Vec<PositionGroup>, PositionSource) {
    let explicit = baseline
        .position
        .as_deref()
        .map(map_position_groups)
        .unwrap_or_default();
    if !explicit.is_empty() {
        return (explicit, PositionSource::Explicit);
    }

    if let Some(groups) = roster_positions.filter(|g| !g.is_empty()) {
        return (groups.to_vec(), PositionSource::Roster);
    }

    let inferred = infer_position_groups(
        baseline.height_inches,
        baseline.height_text.as_deref(),
        Some(baseline.assists),
        Some(baseline.rebounds),
    );
    if !inferred.is_empty() {
        return (inferred, PositionSource::Inferred);
    }

    (vec![PositionGroup::Guards], PositionSource::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionGroup::*;

    #[test]
    fn maps_position_tokens() {
        assert_eq!(map_position_groups("G-F"), vec![Guards, Forwards]);
        assert_eq!(map_position_groups("pf/c"), vec![Forwards, Centers]);
        assert_eq!(map_position_groups("Center-Forward"), vec![Forwards, Centers]);
        assert_eq!(map_position_groups("PG-SG"), vec![Guards]);
        assert!(map_position_groups("").is_empty());
        assert!(map_position_groups("UTIL").is_empty());
    }

    #[test]
    fn infers_from_height() {
        assert_eq!(infer_position_groups(Some(76.0), None, None, None), vec![Guards]);
        assert_eq!(infer_position_groups(Some(80.0), None, None, None), vec![Forwards]);
        assert_eq!(infer_position_groups(Some(83.0), None, None, None), vec![Centers]);
        assert_eq!(infer_position_groups(None, Some("6-11"), None, None), vec![Centers]);
        assert_eq!(infer_position_groups(None, Some("77"), None, None), vec![Guards]);
    }

    #[test]
    fn infers_from_production_without_height() {
        assert_eq!(infer_position_groups(None, None, Some(7.1), Some(3.0)), vec![Guards]);
        assert_eq!(infer_position_groups(None, None, Some(1.2), Some(9.4)), vec![Centers]);
        assert_eq!(infer_position_groups(None, None, Some(2.0), Some(4.0)), vec![Forwards]);
        assert!(infer_position_groups(None, None, None, None).is_empty());
    }

    fn baseline(position: Option<&str>) -> PlayerBaseline {
        PlayerBaseline {
            player_id: 1,
            player_name: "Test".into(),
            team: "BOS".into(),
            games_played: 1,
            minutes: 20.0,
            points: 10.0,
            rebounds: 9.0,
            assists: 1.0,
            steals: 0.0,
            blocks: 0.0,
            fg3m: 0.0,
            fg3a: 0.0,
            fgm: 0.0,
            fga: 0.0,
            ftm: 0.0,
            fta: 0.0,
            turnovers: 0.0,
            plus_minus: 0.0,
            fg_pct: 0.0,
            fg3_pct: 0.0,
            ft_pct: 0.0,
            position: position.map(str::to_string),
            height_inches: None,
            height_text: None,
        }
    }

    #[test]
    fn classification_priority() {
        assert_eq!(classify(&baseline(Some("F")), Some(&[Guards][..])), (vec![Forwards], PositionSource::Explicit));
        assert_eq!(classify(&baseline(None), Some(&[Guards][..])), (vec![Guards], PositionSource::Roster));
        assert_eq!(classify(&baseline(None), None), (vec![Centers], PositionSource::Inferred));
    }
}
