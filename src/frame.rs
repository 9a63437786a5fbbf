//! Tabular upstream payloads.
//!
//! stats.nba.com answers with `resultSets: [{name, headers, rowSet}]`. Rows are
//! kept as raw JSON scalars until a typed table picks the columns it needs.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::ShapeError;
use crate::models::Stat;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Frame { columns, rows }
    }

    /// Builds a frame from `&str` headers, mostly for fixtures.
    pub fn from_records(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Frame {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Result set by position, accepting both `resultSets` and the singular `resultSet`.
    pub fn from_result_set(payload: &Value, index: usize) -> Option<Frame> {
        let set = match payload.get("resultSets") {
            Some(Value::Array(sets)) => sets.get(index)?,
            Some(single @ Value::Object(_)) if index == 0 => single,
            _ => payload.get("resultSet")?,
        };
        Self::from_set(set)
    }

    /// Result set by its `name` field (e.g. `GameHeader`, `LineScore`).
    pub fn from_named_result_set(payload: &Value, name: &str) -> Option<Frame> {
        let sets = payload.get("resultSets")?.as_array()?;
        let set = sets
            .iter()
            .find(|set| set.get("name").and_then(Value::as_str) == Some(name))?;
        Self::from_set(set)
    }

    fn from_set(set: &Value) -> Option<Frame> {
        let columns = set
            .get("headers")?
            .as_array()?
            .iter()
            .map(|h| h.as_str().unwrap_or_default().to_string())
            .collect();
        let rows = set
            .get("rowSet")?
            .as_array()?
            .iter()
            .filter_map(|row| row.as_array().cloned())
            .collect();
        Some(Frame { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first candidate header present, compared case-insensitively.
    pub fn pick_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|name| {
            self.columns
                .iter()
                .position(|column| column.eq_ignore_ascii_case(name))
        })
    }

    fn require(&self, names: &[&str]) -> Result<Vec<usize>, ShapeError> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.pick_column(&[name]) {
                Some(idx) => found.push(idx),
                None => missing.push(name.to_string()),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(ShapeError::MissingColumns(missing))
        }
    }
}

fn cell(row: &[Value], idx: Option<usize>) -> Option<&Value> {
    idx.and_then(|i| row.get(i))
}

/// Numeric cell. Accepts numbers, numeric strings and `MM:SS` minute strings.
pub fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let s = s.trim();
            if let Some((mins, secs)) = s.split_once(':') {
                let mins: f64 = mins.parse().ok()?;
                let secs: f64 = secs.parse().ok()?;
                return Some(mins + secs / 60.0);
            }
            s.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

pub fn value_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// Trimmed, non-empty text for string or numeric cells.
pub fn value_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

/// Parses the date formats the stats feeds use.
pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    ["%m/%d/%Y", "%b %d, %Y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn cell_f64(row: &[Value], idx: Option<usize>) -> Option<f64> {
    cell(row, idx).and_then(value_f64)
}

fn cell_string(row: &[Value], idx: Option<usize>) -> Option<String> {
    cell(row, idx).and_then(value_string)
}

fn cell_date(row: &[Value], idx: Option<usize>) -> Option<NaiveDate> {
    cell_string(row, idx).and_then(|s| parse_game_date(&s))
}

/// Box-score line for one player or team game; absent cells count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxScore {
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    pub stl: f64,
    pub blk: f64,
    pub fg3m: f64,
    pub fg3a: f64,
    pub fgm: f64,
    pub fga: f64,
    pub ftm: f64,
    pub fta: f64,
    pub oreb: f64,
    pub tov: f64,
    pub plus_minus: f64,
}

impl BoxScore {
    pub fn get(&self, stat: Stat) -> f64 {
        match stat {
            Stat::Pts => self.pts,
            Stat::Reb => self.reb,
            Stat::Ast => self.ast,
            Stat::Fg3m => self.fg3m,
            Stat::Stl => self.stl,
            Stat::Blk => self.blk,
        }
    }
}

struct BoxScoreColumns {
    pts: Option<usize>,
    reb: Option<usize>,
    ast: Option<usize>,
    stl: Option<usize>,
    blk: Option<usize>,
    fg3m: Option<usize>,
    fg3a: Option<usize>,
    fgm: Option<usize>,
    fga: Option<usize>,
    ftm: Option<usize>,
    fta: Option<usize>,
    oreb: Option<usize>,
    tov: Option<usize>,
    plus_minus: Option<usize>,
}

impl BoxScoreColumns {
    fn locate(frame: &Frame) -> Self {
        BoxScoreColumns {
            pts: frame.pick_column(&["PTS"]),
            reb: frame.pick_column(&["REB"]),
            ast: frame.pick_column(&["AST"]),
            stl: frame.pick_column(&["STL"]),
            blk: frame.pick_column(&["BLK"]),
            fg3m: frame.pick_column(&["FG3M"]),
            fg3a: frame.pick_column(&["FG3A"]),
            fgm: frame.pick_column(&["FGM"]),
            fga: frame.pick_column(&["FGA"]),
            ftm: frame.pick_column(&["FTM"]),
            fta: frame.pick_column(&["FTA"]),
            oreb: frame.pick_column(&["OREB"]),
            tov: frame.pick_column(&["TOV"]),
            plus_minus: frame.pick_column(&["PLUS_MINUS"]),
        }
    }

    fn read(&self, row: &[Value]) -> BoxScore {
        let f = |idx| cell_f64(row, idx).unwrap_or(0.0);
        BoxScore {
            pts: f(self.pts),
            reb: f(self.reb),
            ast: f(self.ast),
            stl: f(self.stl),
            blk: f(self.blk),
            fg3m: f(self.fg3m),
            fg3a: f(self.fg3a),
            fgm: f(self.fgm),
            fga: f(self.fga),
            ftm: f(self.ftm),
            fta: f(self.fta),
            oreb: f(self.oreb),
            tov: f(self.tov),
            plus_minus: f(self.plus_minus),
        }
    }
}

/// One player's line for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerGameRow {
    pub player_id: i64,
    pub player_name: String,
    pub team: String,
    pub game_id: String,
    pub game_date: NaiveDate,
    pub matchup: String,
    /// `None` when the minutes cell is blank (DNP rows).
    pub minutes: Option<f64>,
    pub box_score: BoxScore,
    pub position: Option<String>,
    pub height_inches: Option<f64>,
    pub height_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerLogTable {
    pub rows: Vec<PlayerGameRow>,
    /// MATCHUP, GAME_ID and every tracked stat were present upstream.
    pub has_dvp_columns: bool,
}

impl PlayerLogTable {
    pub fn from_frame(frame: &Frame) -> Result<Self, ShapeError> {
        let required = frame.require(&["PLAYER_ID", "PLAYER_NAME", "TEAM_ABBREVIATION", "MIN"])?;
        let (id_col, name_col, team_col, min_col) =
            (required[0], required[1], required[2], required[3]);
        let date_col = frame
            .pick_column(&["GAME_DATE", "GAME_DATE_EST"])
            .ok_or_else(|| ShapeError::MissingColumns(vec!["GAME_DATE".to_string()]))?;

        let game_col = frame.pick_column(&["GAME_ID"]);
        let matchup_col = frame.pick_column(&["MATCHUP"]);
        let position_col = frame.pick_column(&[
            "POSITION",
            "PLAYER_POSITION",
            "PLAYER_POSITION_ABBREVIATION",
            "POS",
        ]);
        let height_inches_col = frame.pick_column(&["PLAYER_HEIGHT_INCHES", "HEIGHT_INCHES"]);
        let height_col = frame.pick_column(&["PLAYER_HEIGHT", "HEIGHT"]);
        let stats = BoxScoreColumns::locate(frame);

        let has_dvp_columns = game_col.is_some()
            && matchup_col.is_some()
            && Stat::ALL.iter().all(|s| frame.pick_column(&[s.column()]).is_some());

        let rows = frame
            .rows
            .iter()
            .filter_map(|row| {
                let player_id = cell(row, Some(id_col)).and_then(value_i64)?;
                let game_date = cell_date(row, Some(date_col))?;
                Some(PlayerGameRow {
                    player_id,
                    player_name: cell_string(row, Some(name_col)).unwrap_or_default(),
                    team: cell_string(row, Some(team_col))
                        .map(|t| t.to_uppercase())
                        .unwrap_or_default(),
                    game_id: cell_string(row, game_col).unwrap_or_default(),
                    game_date,
                    matchup: cell_string(row, matchup_col).unwrap_or_default(),
                    minutes: cell_f64(row, Some(min_col)),
                    box_score: stats.read(row),
                    position: cell_string(row, position_col),
                    height_inches: cell_f64(row, height_inches_col),
                    height_text: cell_string(row, height_col),
                })
            })
            .collect();

        Ok(PlayerLogTable { rows, has_dvp_columns })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn as_of(&self, as_of: NaiveDate) -> PlayerLogTable {
        PlayerLogTable {
            rows: self.rows.iter().filter(|r| r.game_date <= as_of).cloned().collect(),
            has_dvp_columns: self.has_dvp_columns,
        }
    }

    pub fn max_game_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.game_date).max()
    }
}

/// One team's line for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamGameRow {
    pub game_id: String,
    pub team: String,
    pub game_date: NaiveDate,
    pub matchup: String,
    pub box_score: BoxScore,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamLogTable {
    pub rows: Vec<TeamGameRow>,
    /// FGA, FTA, OREB, TOV and PTS were present upstream.
    pub has_metric_columns: bool,
}

impl TeamLogTable {
    pub fn from_frame(frame: &Frame) -> Result<Self, ShapeError> {
        let required = frame.require(&["GAME_ID", "TEAM_ABBREVIATION"])?;
        let (game_col, team_col) = (required[0], required[1]);
        let date_col = frame
            .pick_column(&["GAME_DATE", "GAME_DATE_EST"])
            .ok_or_else(|| ShapeError::MissingColumns(vec!["GAME_DATE".to_string()]))?;
        let matchup_col = frame.pick_column(&["MATCHUP"]);
        let stats = BoxScoreColumns::locate(frame);
        let has_metric_columns = ["FGA", "FTA", "OREB", "TOV", "PTS"]
            .iter()
            .all(|c| frame.pick_column(&[c]).is_some());

        let rows = frame
            .rows
            .iter()
            .filter_map(|row| {
                let game_date = cell_date(row, Some(date_col))?;
                let game_id = cell_string(row, Some(game_col))?;
                let team = cell_string(row, Some(team_col))?.to_uppercase();
                Some(TeamGameRow {
                    game_id,
                    team,
                    game_date,
                    matchup: cell_string(row, matchup_col)
                        .map(|m| m.to_uppercase())
                        .unwrap_or_default(),
                    box_score: stats.read(row),
                })
            })
            .collect();

        Ok(TeamLogTable { rows, has_metric_columns })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn as_of(&self, as_of: NaiveDate) -> TeamLogTable {
        TeamLogTable {
            rows: self.rows.iter().filter(|r| r.game_date <= as_of).cloned().collect(),
            has_metric_columns: self.has_metric_columns,
        }
    }

    pub fn max_game_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.game_date).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn player_frame() -> Frame {
        Frame::from_records(
            &["PLAYER_ID", "PLAYER_NAME", "TEAM_ABBREVIATION", "GAME_ID", "GAME_DATE", "MATCHUP", "MIN", "PTS"],
            vec![
                vec![json!(1), json!("Player One"), json!("bos"), json!("001"), json!("2026-02-01T00:00:00"), json!("BOS vs. CHI"), json!(30), json!(20)],
                vec![json!(1), json!("Player One"), json!("BOS"), json!("002"), json!("2026-02-12"), json!("BOS @ NYK"), json!("31:30"), json!(10)],
                vec![json!(null), json!("Ghost"), json!("BOS"), json!("003"), json!("2026-02-02"), json!("BOS @ NYK"), json!(10), json!(1)],
                vec![json!(2), json!("Player Two"), json!("CHI"), json!("001"), json!("bad-date"), json!("CHI @ BOS"), json!(12), json!(4)],
            ],
        )
    }

    #[test]
    fn pick_column_is_case_insensitive() {
        let frame = Frame::from_records(&["Game_Date", "pts"], vec![]);
        assert_eq!(frame.pick_column(&["GAME_DATE_EST", "GAME_DATE"]), Some(0));
        assert_eq!(frame.pick_column(&["PTS"]), Some(1));
        assert_eq!(frame.pick_column(&["REB"]), None);
    }

    #[test]
    fn reads_result_sets() {
        let payload = json!({
            "resultSets": [
                {"name": "GameHeader", "headers": ["GAME_ID"], "rowSet": [["0022500001"]]},
                {"name": "LineScore", "headers": ["TEAM_ID"], "rowSet": [[1], [2]]}
            ]
        });
        let header = Frame::from_result_set(&payload, 0).unwrap();
        assert_eq!(header.len(), 1);
        let lines = Frame::from_named_result_set(&payload, "LineScore").unwrap();
        assert_eq!(lines.columns, vec!["TEAM_ID".to_string()]);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn player_rows_drop_missing_ids_and_dates() {
        let table = PlayerLogTable::from_frame(&player_frame()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].team, "BOS");
        assert_eq!(table.rows[1].minutes, Some(31.5));
        assert!(!table.has_dvp_columns);
    }

    #[test]
    fn missing_required_columns_is_shape_error() {
        let frame = Frame::from_records(&["PLAYER_ID", "GAME_DATE"], vec![]);
        let err = PlayerLogTable::from_frame(&frame).unwrap_err();
        assert_eq!(
            err,
            ShapeError::MissingColumns(vec![
                "PLAYER_NAME".to_string(),
                "TEAM_ABBREVIATION".to_string(),
                "MIN".to_string()
            ])
        );
    }

    #[test]
    fn filter_as_of_and_max_date() {
        let table = PlayerLogTable::from_frame(&player_frame()).unwrap();
        assert_eq!(table.max_game_date(), Some(d(2026, 2, 12)));
        let filtered = table.as_of(d(2026, 2, 10));
        assert_eq!(filtered.rows.len(), 1);
        assert_eq!(filtered.max_game_date(), Some(d(2026, 2, 1)));
    }

    #[test]
    fn parses_feed_date_formats() {
        assert_eq!(parse_game_date("2026-02-10T00:00:00"), Some(d(2026, 2, 10)));
        assert_eq!(parse_game_date("02/10/2026"), Some(d(2026, 2, 10)));
        assert_eq!(parse_game_date("Feb 10, 2026"), Some(d(2026, 2, 10)));
        assert_eq!(parse_game_date("soon"), None);
    }
}
